//! Registry configuration from TOML (`[registry]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// # Example
///
/// ```toml
/// [registry]
/// catalog = "tools.toml"
/// deprecation_usage_threshold = 1
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRegistryConfig {
    /// Tool catalog file (`[[tools]]` entries)
    pub catalog: Option<PathBuf>,
    /// `tools sweep` deprecates tools with fewer invocations than this
    pub deprecation_usage_threshold: u64,
}

impl Default for FileRegistryConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            deprecation_usage_threshold: 1,
        }
    }
}
