//! Versioned tool catalog.
//!
//! [`ToolCatalog`] is the immutable-by-convention snapshot that every reader
//! (discovery, validation, attestation) works against. Registries hold the
//! current catalog behind an `Arc` and replace it wholesale on each write,
//! bumping [`ToolCatalog::revision`].
//!
//! Registration is append-only: a `name@version` pair can be inserted once
//! and its schemas are never modified afterwards. New behaviour means a new
//! version.

use super::entities::{Deprecation, Tool, ToolKey, ToolVersion};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by catalog writes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(ToolKey),

    #[error("Invalid tool '{tool}': {reason}")]
    SchemaInvalid { tool: String, reason: String },

    #[error("Tool not found: {0}")]
    NotFound(ToolKey),
}

/// Snapshot of all registered tools.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    dimension: usize,
    revision: u64,
    tools: BTreeMap<ToolKey, Tool>,
}

impl ToolCatalog {
    /// Create an empty catalog whose embeddings all have `dimension` entries.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            revision: 0,
            tools: BTreeMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, key: &ToolKey) -> Option<&Tool> {
        self.tools.get(key)
    }

    pub fn get_version(&self, name: &str, version: ToolVersion) -> Option<&Tool> {
        self.tools.get(&ToolKey::new(name, version))
    }

    /// Highest non-deprecated version registered under `name`.
    pub fn latest(&self, name: &str) -> Option<&Tool> {
        self.versions(name).filter(|t| !t.is_deprecated()).last()
    }

    /// All versions of `name`, ascending.
    pub fn versions<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Tool> {
        self.tools
            .range(ToolKey::new(name, ToolVersion::new(0, 0, 0))..)
            .take_while(move |(key, _)| key.name == name)
            .map(|(_, tool)| tool)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    /// Non-deprecated tools.
    pub fn active(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values().filter(|t| !t.is_deprecated())
    }

    /// Check a tool record for structural validity against this catalog.
    pub fn check_tool(&self, tool: &Tool) -> Result<(), RegistryError> {
        let invalid = |reason: String| RegistryError::SchemaInvalid {
            tool: tool.key().to_string(),
            reason,
        };

        if tool.name.trim().is_empty() {
            return Err(invalid("tool name must not be empty".to_string()));
        }
        if tool.name.contains('@') {
            return Err(invalid("tool name must not contain '@'".to_string()));
        }
        if tool.scopes.is_empty() || tool.scopes.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("tool must declare at least one non-empty scope".to_string()));
        }
        if tool.embedding.dimension() != self.dimension {
            return Err(invalid(format!(
                "embedding has {} dimensions, registry expects {}",
                tool.embedding.dimension(),
                self.dimension
            )));
        }
        if !tool.embedding.is_finite() {
            return Err(invalid("embedding contains non-finite values".to_string()));
        }
        tool.input_schema
            .check_definition()
            .map_err(|e| invalid(format!("input schema: {}", e)))?;
        tool.output_schema
            .check_definition()
            .map_err(|e| invalid(format!("output schema: {}", e)))?;
        Ok(())
    }

    /// Append a new tool version.
    pub fn insert(&mut self, mut tool: Tool) -> Result<ToolKey, RegistryError> {
        let key = tool.key();
        if self.tools.contains_key(&key) {
            return Err(RegistryError::DuplicateTool(key));
        }
        self.check_tool(&tool)?;
        // a fresh registration never carries over telemetry or soft-removal
        tool.stats = Default::default();
        tool.deprecation = None;
        self.tools.insert(key.clone(), tool);
        self.revision += 1;
        Ok(key)
    }

    /// Soft-remove a tool. Returns `false` if it was already deprecated.
    pub fn deprecate(
        &mut self,
        key: &ToolKey,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<bool, RegistryError> {
        let tool = self
            .tools
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;
        if tool.is_deprecated() {
            return Ok(false);
        }
        tool.deprecation = Some(Deprecation {
            reason: reason.into(),
            at,
        });
        self.revision += 1;
        Ok(true)
    }

    /// Fold one invocation into a tool's advisory statistics.
    pub fn record_invocation(
        &mut self,
        key: &ToolKey,
        latency_ms: u64,
        success: bool,
    ) -> Result<(), RegistryError> {
        let tool = self
            .tools
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;
        tool.stats.record(latency_ms, success);
        self.revision += 1;
        Ok(())
    }

    /// Keys of active tools invoked fewer than `min_invocations` times.
    pub fn underused(&self, min_invocations: u64) -> Vec<ToolKey> {
        self.active()
            .filter(|t| t.stats.invocations < min_invocations)
            .map(|t| t.key())
            .collect()
    }
}
