//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// # Example
///
/// ```toml
/// [logging]
/// audit_log = ".conductor/audit.jsonl"
/// dir = ".conductor/logs"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL audit trail
    pub audit_log: Option<PathBuf>,
    /// Directory for daily rolling diagnostic logs
    pub dir: Option<PathBuf>,
}
