//! Tool domain entities

use super::embedding::Embedding;
use super::schema::Schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Semantic version of a registered tool (`major.minor.patch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ToolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ToolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(format!("invalid version '{}': expected major.minor.patch", s));
        }
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| format!("invalid version '{}': '{}' is not a number", s, part))
        };
        Ok(Self::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }
}

impl TryFrom<String> for ToolVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ToolVersion> for String {
    fn from(version: ToolVersion) -> Self {
        version.to_string()
    }
}

impl std::fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Registry key of a tool: name plus version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ToolKey {
    pub name: String,
    pub version: ToolVersion,
}

impl ToolKey {
    pub fn new(name: impl Into<String>, version: ToolVersion) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl FromStr for ToolKey {
    type Err = String;

    /// Parses `name@major.minor.patch`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = s
            .rsplit_once('@')
            .ok_or_else(|| format!("invalid tool key '{}': expected name@version", s))?;
        if name.is_empty() {
            return Err(format!("invalid tool key '{}': empty name", s));
        }
        Ok(Self::new(name, version.parse()?))
    }
}

impl std::fmt::Display for ToolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Advisory usage statistics. Never used for correctness decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolStats {
    pub invocations: u64,
    pub failures: u64,
    pub avg_latency_ms: f64,
}

impl ToolStats {
    pub fn record(&mut self, latency_ms: u64, success: bool) {
        self.invocations += 1;
        if !success {
            self.failures += 1;
        }
        // running mean
        let n = self.invocations as f64;
        self.avg_latency_ms += (latency_ms as f64 - self.avg_latency_ms) / n;
    }

    pub fn success_rate(&self) -> Option<f64> {
        if self.invocations == 0 {
            None
        } else {
            Some((self.invocations - self.failures) as f64 / self.invocations as f64)
        }
    }
}

/// Soft-removal marker. Deprecated tools stay in the catalog for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deprecation {
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// A registered capability that plan steps can invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique name (e.g., "CustomerProfileTool")
    pub name: String,
    pub version: ToolVersion,
    #[serde(default)]
    pub description: String,
    /// Tenant or business-unit domains allowed to use this tool
    pub scopes: Vec<String>,
    #[serde(default)]
    pub input_schema: Schema,
    #[serde(default)]
    pub output_schema: Schema,
    pub embedding: Embedding,
    #[serde(default)]
    pub stats: ToolStats,
    /// Remote endpoint for network-backed invokers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation: Option<Deprecation>,
}

impl Tool {
    pub fn new(name: impl Into<String>, version: ToolVersion, embedding: Embedding) -> Self {
        Self {
            name: name.into(),
            version,
            description: String::new(),
            scopes: Vec::new(),
            input_schema: Schema::default(),
            output_schema: Schema::default(),
            embedding,
            stats: ToolStats::default(),
            endpoint: None,
            deprecation: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn key(&self) -> ToolKey {
        ToolKey::new(self.name.clone(), self.version)
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecation.is_some()
    }

    /// Whether any of this tool's scopes appears in `domains`.
    pub fn in_any_domain(&self, domains: &BTreeSet<String>) -> bool {
        self.scopes.iter().any(|s| domains.contains(s))
    }
}
