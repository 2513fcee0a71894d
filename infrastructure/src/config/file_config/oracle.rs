//! Plan oracle configuration from TOML (`[oracle]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where one tier's plans come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleSource {
    /// Plan document on disk
    File(PathBuf),
    /// HTTP endpoint (requires the `http` feature)
    Endpoint(String),
}

/// # Example
///
/// ```toml
/// [oracle]
/// low = { file = "plans/draft.json" }
/// high = { endpoint = "https://planner.internal/high" }
/// ```
///
/// When `high` is unset the low tier's source is used for both tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOracleConfig {
    pub low: Option<OracleSource>,
    pub high: Option<OracleSource>,
}
