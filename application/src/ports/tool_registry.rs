//! Tool Registry port
//!
//! Defines the interface for storing and discovering tools. Writes are
//! serialized by the implementation; reads go through a copy-on-write
//! [`ToolCatalog`] snapshot so a search never observes a half-applied write.

use conductor_domain::{Embedding, ExecutionContext, RegistryError, Tool, ToolCatalog, ToolKey, ToolMatch};
use std::sync::Arc;

/// Port for the tool registry
///
/// Implementations (adapters) live in the infrastructure layer.
pub trait ToolRegistryPort: Send + Sync {
    /// Register a new tool version.
    fn register(&self, tool: Tool) -> Result<ToolKey, RegistryError>;

    /// Soft-remove a tool version. Returns `false` if already deprecated.
    fn deprecate(&self, key: &ToolKey, reason: &str) -> Result<bool, RegistryError>;

    /// Current immutable snapshot of the catalog.
    fn snapshot(&self) -> Arc<ToolCatalog>;

    /// Up to `top_k` tools matching `intent` inside the context's domains.
    fn search(&self, intent: &Embedding, context: &ExecutionContext, top_k: usize) -> Vec<ToolMatch>;

    /// Fold one invocation into the tool's advisory statistics.
    fn record_invocation(&self, key: &ToolKey, latency_ms: u64, success: bool);

    /// Embedding dimension every registered tool must have.
    fn dimension(&self) -> usize {
        self.snapshot().dimension()
    }

    /// Deprecate every active tool invoked fewer than `min_invocations` times.
    ///
    /// Returns the keys that were deprecated by this sweep.
    fn sweep_underused(&self, min_invocations: u64) -> Vec<ToolKey> {
        let reason = format!("fewer than {} invocations", min_invocations);
        self.snapshot()
            .underused(min_invocations)
            .into_iter()
            .filter(|key| matches!(self.deprecate(key, &reason), Ok(true)))
            .collect()
    }
}
