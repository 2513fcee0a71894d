//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod audit_logger;
pub mod credential_escrow;
pub mod embedding;
pub mod execution_progress;
pub mod plan_oracle;
pub mod tool_invoker;
pub mod tool_registry;
