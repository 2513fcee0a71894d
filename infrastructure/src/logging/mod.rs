//! Audit trail output and replay.
//!
//! Provides [`JsonlAuditLogger`], an append-only JSONL writer that implements
//! the [`AuditLogger`](conductor_application::AuditLogger) port, and
//! [`replay_invocations`] to feed a trail back into a registry.

mod jsonl_audit;
mod replay;

pub use jsonl_audit::JsonlAuditLogger;
pub use replay::replay_invocations;
