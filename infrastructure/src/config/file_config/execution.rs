//! Execution configuration from TOML (`[execution]` section)

use conductor_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// Longest credential lifetime a configuration may request (24 hours).
pub const MAX_CREDENTIAL_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// # Example
///
/// ```toml
/// [execution]
/// max_parallel_steps = 4
/// tenant_concurrency = 8
/// oracle_timeout_ms = 30000
/// credential_ttl_ms = 60000
/// allow_unsealed_plans = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutionConfig {
    pub max_parallel_steps: usize,
    pub tenant_concurrency: usize,
    pub oracle_timeout_ms: u64,
    pub credential_ttl_ms: u64,
    /// Accept plans without an attestation
    pub allow_unsealed_plans: bool,
}

impl Default for FileExecutionConfig {
    fn default() -> Self {
        Self {
            max_parallel_steps: 4,
            tenant_concurrency: 8,
            oracle_timeout_ms: 30_000,
            credential_ttl_ms: 60_000,
            allow_unsealed_plans: false,
        }
    }
}

impl FileExecutionConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues: Vec<ConfigIssue> = [
            ("max_parallel_steps", self.max_parallel_steps as u64),
            ("tenant_concurrency", self.tenant_concurrency as u64),
            ("oracle_timeout_ms", self.oracle_timeout_ms),
            ("credential_ttl_ms", self.credential_ttl_ms),
        ]
        .into_iter()
        .filter(|(_, value)| *value == 0)
        .map(|(field, _)| {
            ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                format!("execution.{} must be > 0", field),
            )
        })
        .collect();

        if self.credential_ttl_ms > MAX_CREDENTIAL_TTL_MS {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::LimitTooLarge,
                format!(
                    "execution.credential_ttl_ms must be at most {} (got {})",
                    MAX_CREDENTIAL_TTL_MS, self.credential_ttl_ms
                ),
            ));
        }
        issues
    }
}
