//! Tool Invoker port
//!
//! Invokes one pinned tool version with fully resolved input and the
//! short-lived credential granted for this attempt.

use async_trait::async_trait;
use conductor_domain::{PlanId, StepId, ToolError, ToolKey};
use serde_json::{Map, Value};

/// One invocation attempt.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub plan_id: PlanId,
    pub step_id: StepId,
    pub tool: ToolKey,
    pub endpoint: Option<String>,
    pub input: Map<String, Value>,
    /// Bearer token from the credential escrow.
    pub credential: String,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Port for tool invocation
///
/// Implementations should not apply their own timeouts; the engine bounds
/// every call by the step's `timeout_ms`.
#[async_trait]
pub trait ToolInvokerPort: Send + Sync {
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<Value, ToolError>;
}
