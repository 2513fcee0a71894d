//! Infrastructure layer for conductor
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod context;
pub mod embedding;
pub mod escrow;
pub mod invoker;
pub mod logging;
pub mod oracle;
pub mod registry;

// Re-export commonly used types
pub use config::{ConfigLoader, FileConfig, OracleSource};
pub use context::{ContextFileError, load_context};
pub use embedding::HashingEmbedder;
pub use escrow::InMemoryCredentialEscrow;
#[cfg(feature = "http")]
pub use invoker::HttpToolInvoker;
pub use invoker::{FixtureError, StaticToolInvoker, ToolFixture};
pub use logging::{JsonlAuditLogger, replay_invocations};
#[cfg(feature = "http")]
pub use oracle::HttpPlanOracle;
pub use oracle::{JsonPlanOracle, oracle_payload};
pub use registry::{CatalogFile, CatalogFileError, InMemoryToolRegistry};
