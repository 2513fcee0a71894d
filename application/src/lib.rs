//! Application layer for conductor
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::EngineParams;
pub use ports::{
    audit_logger::{AuditEvent, AuditKind, AuditLogger, NoAuditLogger},
    credential_escrow::{CredentialEscrow, CredentialGrant, CredentialRequest, EscrowError, ScopedGrant},
    embedding::{EmbeddingError, EmbeddingPort},
    execution_progress::{ExecutionProgressNotifier, NoExecutionProgress},
    plan_oracle::{OracleError, PlanOracle, PlanRequest, TieredOracles},
    tool_invoker::{ToolInvocation, ToolInvokerPort},
    tool_registry::ToolRegistryPort,
};
pub use use_cases::discover_tools::{DiscoverToolsError, DiscoverToolsUseCase};
pub use use_cases::escalate::{
    EscalateUseCase, EscalationDecision, EscalationError, EscalationOutcome, PlanningSession,
};
pub use use_cases::execute_plan::{ExecutePlanUseCase, TenantLimiter};
pub use use_cases::generate_plan::{GeneratePlanUseCase, PlanGenerationError};
pub use use_cases::run_goal::{EnginePorts, RunGoalError, RunGoalInput, RunGoalOutput, RunGoalUseCase};
pub use use_cases::validate_plan::{ValidatePlanUseCase, ValidatedPlan, ValidationOutcome};
