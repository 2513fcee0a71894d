//! Domain error types

use thiserror::Error;

/// Errors raised while building domain values from caller input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Goal cannot be empty")]
    EmptyGoal,

    #[error("Goal has {chars} characters, at most {max} allowed")]
    GoalTooLong { chars: usize, max: usize },
}
