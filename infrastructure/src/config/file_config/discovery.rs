//! Discovery configuration from TOML (`[discovery]` section)

use conductor_application::ports::embedding::{EmbeddingError, EmbeddingPort};
use conductor_domain::tool::discovery::DEFAULT_SIMILARITY_THRESHOLD;
use conductor_domain::{ConfigIssue, ConfigIssueCode, TenantPreferenceBoost};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// # Example
///
/// ```toml
/// [discovery]
/// similarity_threshold = 0.75
/// top_k = 5
/// embedding_dimension = 64
///
/// [discovery.tenant_boost]
/// weight = 0.5
///
/// [discovery.tenant_boost.preferences]
/// acme = "billing invoices revenue"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDiscoveryConfig {
    pub similarity_threshold: f32,
    pub top_k: usize,
    /// Dimension of the catalog and of the built-in hashing embedder
    pub embedding_dimension: usize,
    pub tenant_boost: FileTenantBoostConfig,
}

impl Default for FileDiscoveryConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: 5,
            embedding_dimension: 64,
            tenant_boost: FileTenantBoostConfig::default(),
        }
    }
}

/// Additive tenant-preference boost applied to tool embeddings before
/// ranking. Each preference is free text, embedded with the same embedder
/// as the catalog so dimensions always agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTenantBoostConfig {
    pub weight: f32,
    /// Tenant -> preference text
    pub preferences: BTreeMap<String, String>,
}

impl Default for FileTenantBoostConfig {
    fn default() -> Self {
        Self {
            weight: 0.5,
            preferences: BTreeMap::new(),
        }
    }
}

impl FileTenantBoostConfig {
    pub fn is_enabled(&self) -> bool {
        !self.preferences.is_empty() && self.weight > 0.0
    }

    /// Embed every preference and build the boost, or `None` when no tenant
    /// has one.
    pub async fn build(
        &self,
        embedder: &dyn EmbeddingPort,
    ) -> Result<Option<TenantPreferenceBoost>, EmbeddingError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let mut boost = TenantPreferenceBoost::new(self.weight);
        for (tenant, text) in &self.preferences {
            boost = boost.with_preference(tenant.clone(), embedder.embed(text).await?);
        }
        Ok(Some(boost))
    }
}

impl FileDiscoveryConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ThresholdOutOfRange,
                format!(
                    "discovery.similarity_threshold must be within [0, 1], got {}",
                    self.similarity_threshold
                ),
            ));
        }
        if self.top_k == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "discovery.top_k must be > 0",
            ));
        }
        if self.embedding_dimension == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit,
                "discovery.embedding_dimension must be > 0",
            ));
        }
        let weight = self.tenant_boost.weight;
        if !weight.is_finite() || weight < 0.0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidWeight,
                format!("discovery.tenant_boost.weight must be finite and >= 0, got {}", weight),
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use conductor_domain::{ContextBoost, Embedding, ExecutionContext, Tool, ToolVersion};

    #[test]
    fn test_boost_section_parses() {
        let config: FileDiscoveryConfig = toml::from_str(
            r#"
top_k = 3

[tenant_boost]
weight = 0.25

[tenant_boost.preferences]
acme = "billing invoices"
"#,
        )
        .unwrap();

        assert_eq!(config.top_k, 3);
        assert_eq!(config.similarity_threshold, DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(config.tenant_boost.weight, 0.25);
        assert_eq!(config.tenant_boost.preferences["acme"], "billing invoices");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_bad_weight_is_an_error() {
        let mut config = FileDiscoveryConfig::default();
        config.tenant_boost.weight = -1.0;
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::InvalidWeight);

        config.tenant_boost.weight = f32::NAN;
        assert_eq!(config.validate()[0].code, ConfigIssueCode::InvalidWeight);
    }

    #[tokio::test]
    async fn test_build_embeds_preferences() {
        let embedder = HashingEmbedder::new(8);
        let disabled = FileTenantBoostConfig::default();
        assert!(disabled.build(&embedder).await.unwrap().is_none());

        let mut config = FileTenantBoostConfig::default();
        config.preferences.insert("acme".to_string(), "billing invoices".to_string());
        let boost = config.build(&embedder).await.unwrap().unwrap();

        let tool = Tool::new("A", ToolVersion::new(1, 0, 0), Embedding::new(vec![0.0; 8]));
        let acme = ExecutionContext::new("alice", "acme");
        let other = ExecutionContext::new("bob", "globex");
        let preference = embedder.embed("billing invoices").await.unwrap();

        let boosted = boost.boost(&tool, &acme);
        let expected: Vec<f32> = preference.as_slice().iter().map(|v| v * 0.5).collect();
        assert_eq!(boosted.as_slice(), expected.as_slice());
        assert_eq!(boost.boost(&tool, &other).as_slice(), tool.embedding.as_slice());
    }
}
