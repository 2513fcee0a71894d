//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod discover_tools;
pub mod escalate;
pub mod execute_plan;
pub mod generate_plan;
pub mod run_goal;
pub(crate) mod shared;
pub mod validate_plan;

#[cfg(test)]
pub(crate) mod test_support;
