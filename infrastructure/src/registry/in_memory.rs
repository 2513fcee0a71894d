//! Copy-on-write in-memory tool registry.
//!
//! Readers clone an `Arc<ToolCatalog>` under a short read lock and then work
//! on an immutable snapshot. Writers are serialized by a separate mutex,
//! build the next catalog from the current one and swap it in, so a search
//! never observes a half-applied registration.

use chrono::Utc;
use conductor_application::ports::tool_registry::ToolRegistryPort;
use conductor_domain::tool::discovery::DEFAULT_SIMILARITY_THRESHOLD;
use conductor_domain::{
    ContextBoost, DiscoveryQuery, Embedding, ExecutionContext, NoBoost, RegistryError, Tool,
    ToolCatalog, ToolKey, ToolMatch, rank_tools,
};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

pub struct InMemoryToolRegistry {
    current: RwLock<Arc<ToolCatalog>>,
    writer: Mutex<()>,
    boost: Box<dyn ContextBoost>,
    threshold: f32,
}

impl InMemoryToolRegistry {
    pub fn new(dimension: usize) -> Self {
        Self::from_catalog(ToolCatalog::new(dimension))
    }

    pub fn from_catalog(catalog: ToolCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
            writer: Mutex::new(()),
            boost: Box::new(NoBoost),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_boost(mut self, boost: impl ContextBoost + 'static) -> Self {
        self.boost = Box::new(boost);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Register every tool, stopping at the first rejected one.
    pub fn register_all(&self, tools: impl IntoIterator<Item = Tool>) -> Result<usize, RegistryError> {
        let mut count = 0;
        for tool in tools {
            self.register(tool)?;
            count += 1;
        }
        Ok(count)
    }

    fn update<T>(
        &self,
        apply: impl FnOnce(&mut ToolCatalog) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = ToolCatalog::clone(&self.snapshot());
        let result = apply(&mut next)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(result)
    }
}

impl ToolRegistryPort for InMemoryToolRegistry {
    fn register(&self, tool: Tool) -> Result<ToolKey, RegistryError> {
        let key = self.update(|catalog| catalog.insert(tool))?;
        info!(tool = %key, "Registered tool");
        Ok(key)
    }

    fn deprecate(&self, key: &ToolKey, reason: &str) -> Result<bool, RegistryError> {
        let changed = self.update(|catalog| catalog.deprecate(key, reason, Utc::now()))?;
        if changed {
            info!(tool = %key, reason, "Deprecated tool");
        }
        Ok(changed)
    }

    fn snapshot(&self) -> Arc<ToolCatalog> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn search(&self, intent: &Embedding, context: &ExecutionContext, top_k: usize) -> Vec<ToolMatch> {
        let catalog = self.snapshot();
        let query = DiscoveryQuery::new(intent, context)
            .with_top_k(top_k)
            .with_threshold(self.threshold);
        let matches = rank_tools(&catalog, &query, self.boost.as_ref());
        debug!(
            revision = catalog.revision(),
            tenant = %context.tenant,
            matches = matches.len(),
            "Searched tool catalog"
        );
        matches
    }

    fn record_invocation(&self, key: &ToolKey, latency_ms: u64, success: bool) {
        if let Err(e) = self.update(|catalog| catalog.record_invocation(key, latency_ms, success)) {
            warn!(tool = %key, "Could not record invocation: {}", e);
        }
    }

    fn dimension(&self) -> usize {
        self.snapshot().dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{TenantPreferenceBoost, ToolVersion};

    fn tool(name: &str, major: u32, scope: &str, embedding: Vec<f32>) -> Tool {
        Tool::new(name, ToolVersion::new(major, 0, 0), Embedding::new(embedding)).with_scope(scope)
    }

    fn crm() -> ExecutionContext {
        ExecutionContext::new("alice", "acme").with_domain("crm")
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let registry = InMemoryToolRegistry::new(2);
        registry.register(tool("A", 1, "crm", vec![1.0, 0.0])).unwrap();

        let before = registry.snapshot();
        registry.register(tool("B", 1, "crm", vec![0.0, 1.0])).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(registry.snapshot().len(), 2);
        assert!(registry.snapshot().revision() > before.revision());
    }

    #[test]
    fn test_register_rejects_duplicates_and_bad_dimensions() {
        let registry = InMemoryToolRegistry::new(2);
        registry.register(tool("A", 1, "crm", vec![1.0, 0.0])).unwrap();

        assert!(matches!(
            registry.register(tool("A", 1, "crm", vec![1.0, 0.0])),
            Err(RegistryError::DuplicateTool(_))
        ));
        assert!(matches!(
            registry.register(tool("C", 1, "crm", vec![1.0, 0.0, 0.0])),
            Err(RegistryError::SchemaInvalid { .. })
        ));
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_search_respects_domains_and_threshold() {
        let registry = InMemoryToolRegistry::new(2);
        registry
            .register_all([
                tool("Profile", 1, "crm", vec![1.0, 0.0]),
                tool("Ledger", 1, "finance", vec![1.0, 0.0]),
                tool("Unrelated", 1, "crm", vec![0.0, 1.0]),
            ])
            .unwrap();

        let matches = registry.search(&Embedding::new(vec![1.0, 0.0]), &crm(), 5);
        let names: Vec<&str> = matches.iter().map(|m| m.tool.name.as_str()).collect();
        assert_eq!(names, vec!["Profile"]);
    }

    #[test]
    fn test_search_applies_tenant_boost() {
        let registry = InMemoryToolRegistry::new(2)
            .with_boost(TenantPreferenceBoost::new(2.0).with_preference("acme", Embedding::new(vec![0.0, 1.0])))
            .with_threshold(0.9);
        registry.register(tool("Sideways", 1, "crm", vec![0.1, 0.0])).unwrap();

        let intent = Embedding::new(vec![0.0, 1.0]);
        assert_eq!(registry.search(&intent, &crm(), 5).len(), 1);

        let other = ExecutionContext::new("bob", "globex").with_domain("crm");
        assert!(registry.search(&intent, &other, 5).is_empty());
    }

    #[test]
    fn test_record_invocation_and_sweep() {
        let registry = InMemoryToolRegistry::new(2);
        registry
            .register_all([
                tool("Busy", 1, "crm", vec![1.0, 0.0]),
                tool("Idle", 1, "crm", vec![1.0, 0.0]),
            ])
            .unwrap();
        let busy = ToolKey::new("Busy", ToolVersion::new(1, 0, 0));
        for _ in 0..3 {
            registry.record_invocation(&busy, 10, true);
        }
        // unknown keys are logged, not fatal
        registry.record_invocation(&ToolKey::new("Ghost", ToolVersion::new(1, 0, 0)), 1, false);

        let swept = registry.sweep_underused(2);
        assert_eq!(swept, vec![ToolKey::new("Idle", ToolVersion::new(1, 0, 0))]);
        assert_eq!(registry.snapshot().get(&busy).unwrap().stats.invocations, 3);
        assert!(registry.sweep_underused(2).is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(InMemoryToolRegistry::new(2));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .register(tool(&format!("T{}", i), 1, "crm", vec![1.0, 0.0]))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.snapshot().len(), 8);
    }
}
