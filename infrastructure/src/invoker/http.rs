//! HTTP tool invoker.
//!
//! Each tool's `endpoint` receives a POST with the resolved input and the
//! escrowed credential as a bearer token. Non-2xx statuses map onto
//! [`ToolError`] codes; the engine decides whether to retry.

use async_trait::async_trait;
use conductor_application::ports::tool_invoker::{ToolInvocation, ToolInvokerPort};
use conductor_domain::ToolError;
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct HttpToolInvoker {
    client: reqwest::Client,
}

impl HttpToolInvoker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolInvokerPort for HttpToolInvoker {
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<Value, ToolError> {
        let endpoint = invocation
            .endpoint
            .as_deref()
            .ok_or_else(|| ToolError::not_found(format_args!("endpoint for {}", invocation.tool)))?;

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&invocation.credential)
            .header("X-Plan-Id", invocation.plan_id.to_string())
            .json(&json!({
                "tool": invocation.tool.to_string(),
                "step_id": invocation.step_id,
                "attempt": invocation.attempt,
                "input": invocation.input,
            }))
            .send()
            .await
            .map_err(|e| ToolError::unavailable(format!("Failed to reach {}: {}", endpoint, e)))?;

        let status = response.status();
        debug!(tool = %invocation.tool, status = status.as_u16(), "Tool responded");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::from_http_status(&invocation.tool, status.as_u16(), body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ToolError::execution_failed(format!("Invalid tool response: {}", e)))
    }
}
