//! Application-level configuration.
//!
//! - [`EngineParams`]: discovery, planning and execution control

pub mod engine_params;

pub use conductor_domain::tool::discovery::DEFAULT_SIMILARITY_THRESHOLD;
pub use engine_params::EngineParams;
