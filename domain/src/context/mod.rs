//! Execution context: the immutable authorization and tenant envelope that
//! governs one request's tool access and resource limits.

pub mod entities;

pub use entities::{ExecutionContext, RetentionPolicy, SessionLimits};
