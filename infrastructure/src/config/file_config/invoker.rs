//! Tool invoker configuration from TOML (`[invoker]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// # Example
///
/// ```toml
/// [invoker]
/// fixtures = "fixtures.json"
/// ```
///
/// Without fixtures, tools are called over HTTP at their catalog endpoint
/// (requires the `http` feature).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileInvokerConfig {
    pub fixtures: Option<PathBuf>,
    /// Tool names the escrow refuses credentials for
    pub deny_credentials: Vec<String>,
}
