//! Raw TOML configuration data types
//!
//! These structs mirror the config file layout. Domain types are used
//! directly where they already carry serde defaults (`[escalation]` is an
//! [`EscalationThresholds`]).

mod discovery;
mod execution;
mod invoker;
mod logging;
mod oracle;
mod output;
mod registry;

pub use discovery::{FileDiscoveryConfig, FileTenantBoostConfig};
pub use execution::FileExecutionConfig;
pub use invoker::FileInvokerConfig;
pub use logging::FileLoggingConfig;
pub use oracle::{FileOracleConfig, OracleSource};
pub use output::FileOutputConfig;
pub use registry::FileRegistryConfig;

use conductor_application::EngineParams;
use conductor_domain::{ConfigIssue, ConfigIssueCode, EscalationThresholds};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub discovery: FileDiscoveryConfig,
    pub escalation: EscalationThresholds,
    pub execution: FileExecutionConfig,
    pub registry: FileRegistryConfig,
    pub oracle: FileOracleConfig,
    pub invoker: FileInvokerConfig,
    pub logging: FileLoggingConfig,
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.discovery.validate();
        issues.extend(validate_escalation(&self.escalation));
        issues.extend(self.execution.validate());

        match &self.oracle.low {
            None => issues.push(ConfigIssue::warning(
                ConfigIssueCode::MissingOracle,
                "no [oracle] low source configured; plans cannot be generated",
            )),
            Some(low) => {
                issues.extend(check_source("oracle.low", low));
                match &self.oracle.high {
                    Some(high) => issues.extend(check_source("oracle.high", high)),
                    None => issues.push(ConfigIssue::warning(
                        ConfigIssueCode::SharedOracle,
                        "no [oracle] high source configured; escalation re-uses the low tier",
                    )),
                }
            }
        }

        if let Some(catalog) = &self.registry.catalog {
            issues.extend(check_file("registry.catalog", catalog));
        }
        if let Some(fixtures) = &self.invoker.fixtures {
            issues.extend(check_file("invoker.fixtures", fixtures));
        }

        issues
    }

    pub fn to_engine_params(&self) -> EngineParams {
        let params = EngineParams::default()
            .with_similarity_threshold(self.discovery.similarity_threshold)
            .with_top_k(self.discovery.top_k)
            .with_max_parallel_steps(self.execution.max_parallel_steps)
            .with_tenant_concurrency(self.execution.tenant_concurrency)
            .with_oracle_timeout(Duration::from_millis(self.execution.oracle_timeout_ms))
            .with_credential_ttl(Duration::from_millis(self.execution.credential_ttl_ms))
            .with_escalation(self.escalation.clone());
        if self.execution.allow_unsealed_plans {
            params.allow_unsealed_plans()
        } else {
            params
        }
    }
}

fn validate_escalation(thresholds: &EscalationThresholds) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    for (field, value) in [
        ("complexity_threshold", thresholds.complexity_threshold),
        ("confidence_threshold", thresholds.confidence_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ThresholdOutOfRange,
                format!("escalation.{} must be within [0, 1], got {}", field, value),
            ));
        }
    }
    if !(thresholds.complexity_saturation > 0.0) {
        issues.push(ConfigIssue::error(
            ConfigIssueCode::InvalidSaturation,
            format!(
                "escalation.complexity_saturation must be > 0, got {}",
                thresholds.complexity_saturation
            ),
        ));
    }
    issues
}

fn check_source(field: &str, source: &OracleSource) -> Vec<ConfigIssue> {
    match source {
        OracleSource::File(path) => check_file(field, path),
        OracleSource::Endpoint(_) if !cfg!(feature = "http") => vec![ConfigIssue::error(
            ConfigIssueCode::MissingOracle,
            format!("{} is an endpoint but this build has no `http` feature", field),
        )],
        OracleSource::Endpoint(_) => Vec::new(),
    }
}

fn check_file(field: &str, path: &Path) -> Vec<ConfigIssue> {
    if path.exists() {
        Vec::new()
    } else {
        vec![ConfigIssue::error(
            ConfigIssueCode::MissingFile,
            format!("{}: {} does not exist", field, path.display()),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{OutputFormat, Severity};

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[discovery]
similarity_threshold = 0.6
top_k = 3

[escalation]
confidence_threshold = 0.9
escalate_on_cross_domain = false

[execution]
max_parallel_steps = 2
oracle_timeout_ms = 5000

[oracle]
low = { file = "plans/draft.json" }
high = { endpoint = "https://planner.internal/high" }

[invoker]
fixtures = "fixtures.json"
deny_credentials = ["LedgerTool"]

[output]
format = "json"
color = false
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.discovery.top_k, 3);
        assert_eq!(config.discovery.embedding_dimension, 64);
        assert_eq!(config.escalation.confidence_threshold, 0.9);
        assert_eq!(config.escalation.complexity_threshold, 0.7);
        assert!(!config.escalation.escalate_on_cross_domain);
        assert_eq!(config.execution.tenant_concurrency, 8);
        assert_eq!(
            config.oracle.low,
            Some(OracleSource::File("plans/draft.json".into()))
        );
        assert_eq!(
            config.oracle.high,
            Some(OracleSource::Endpoint("https://planner.internal/high".to_string()))
        );
        assert_eq!(config.invoker.deny_credentials, vec!["LedgerTool"]);
        assert_eq!(config.output.format, Some(OutputFormat::Json));
        assert!(!config.output.color);
    }

    #[test]
    fn test_engine_params_conversion() {
        let mut config = FileConfig::default();
        config.discovery.similarity_threshold = 0.5;
        config.execution.oracle_timeout_ms = 1500;
        config.execution.allow_unsealed_plans = true;

        let params = config.to_engine_params();
        assert_eq!(params.similarity_threshold, 0.5);
        assert_eq!(params.oracle_timeout, Duration::from_millis(1500));
        assert_eq!(params.credential_ttl, Duration::from_secs(60));
        assert!(params.allow_unsealed_plans);
    }

    #[test]
    fn test_default_config_only_warns_about_oracle() {
        let issues = FileConfig::default().validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::MissingOracle);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = FileConfig::default();
        config.discovery.similarity_threshold = 1.5;
        config.escalation.complexity_saturation = 0.0;
        config.execution.max_parallel_steps = 0;
        config.oracle.low = Some(OracleSource::File("/nonexistent/plan.json".into()));

        let codes: Vec<ConfigIssueCode> = config.validate().iter().map(|i| i.code).collect();
        assert!(codes.contains(&ConfigIssueCode::ThresholdOutOfRange));
        assert!(codes.contains(&ConfigIssueCode::InvalidSaturation));
        assert!(codes.contains(&ConfigIssueCode::ZeroLimit));
        assert!(codes.contains(&ConfigIssueCode::MissingFile));
        assert!(codes.contains(&ConfigIssueCode::SharedOracle));
        assert!(config.validate().iter().any(|i| i.is_error()));
    }
}
