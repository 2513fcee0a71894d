//! Execution context loading

mod loader;

pub use loader::{ContextFileError, load_context};
