//! Scripted port fakes shared by the use case tests.

use crate::ports::audit_logger::{AuditEvent, AuditLogger};
use crate::ports::credential_escrow::{
    CredentialEscrow, CredentialGrant, CredentialRequest, EscrowError,
};
use crate::ports::embedding::{EmbeddingError, EmbeddingPort};
use crate::ports::plan_oracle::{OracleError, PlanOracle, PlanRequest};
use crate::ports::tool_invoker::{ToolInvocation, ToolInvokerPort};
use crate::ports::tool_registry::ToolRegistryPort;
use async_trait::async_trait;
use chrono::Utc;
use conductor_domain::{
    DiscoveryQuery, Embedding, ExecutionContext, NoBoost, Plan, PlanTier, RegistryError, Schema,
    Tool, ToolCatalog, ToolError, ToolKey, ToolMatch, ToolVersion, rank_tools,
};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn tool(name: &str, scope: &str) -> Tool {
    Tool::new(name, ToolVersion::new(1, 0, 0), Embedding::new(vec![1.0, 0.0]))
        .with_scope(scope)
        .with_input_schema(Schema::new().allow_additional())
        .with_output_schema(Schema::new().allow_additional())
}

pub(crate) fn context(domains: &[&str]) -> Arc<ExecutionContext> {
    Arc::new(
        domains
            .iter()
            .fold(ExecutionContext::new("alice", "acme"), |ctx, d| ctx.with_domain(*d)),
    )
}

// ==================== Registry ====================

pub(crate) struct CatalogRegistry {
    catalog: Mutex<Arc<ToolCatalog>>,
    pub recorded: Mutex<Vec<(ToolKey, bool)>>,
}

impl CatalogRegistry {
    pub fn new(tools: Vec<Tool>) -> Self {
        let mut catalog = ToolCatalog::new(2);
        for tool in tools {
            catalog.insert(tool).unwrap();
        }
        Self {
            catalog: Mutex::new(Arc::new(catalog)),
            recorded: Mutex::new(Vec::new()),
        }
    }
}

impl ToolRegistryPort for CatalogRegistry {
    fn register(&self, tool: Tool) -> Result<ToolKey, RegistryError> {
        let mut guard = self.catalog.lock().unwrap();
        let mut next = (**guard).clone();
        let key = next.insert(tool)?;
        *guard = Arc::new(next);
        Ok(key)
    }

    fn deprecate(&self, key: &ToolKey, reason: &str) -> Result<bool, RegistryError> {
        let mut guard = self.catalog.lock().unwrap();
        let mut next = (**guard).clone();
        let changed = next.deprecate(key, reason, Utc::now())?;
        *guard = Arc::new(next);
        Ok(changed)
    }

    fn snapshot(&self) -> Arc<ToolCatalog> {
        self.catalog.lock().unwrap().clone()
    }

    fn search(&self, intent: &Embedding, context: &ExecutionContext, top_k: usize) -> Vec<ToolMatch> {
        let catalog = self.snapshot();
        let query = DiscoveryQuery::new(intent, context)
            .with_top_k(top_k)
            .with_threshold(0.75);
        rank_tools(&catalog, &query, &NoBoost)
    }

    fn record_invocation(&self, key: &ToolKey, _latency_ms: u64, success: bool) {
        self.recorded.lock().unwrap().push((key.clone(), success));
    }
}

// ==================== Embedder ====================

pub(crate) struct FixedEmbedder(pub Vec<f32>);

#[async_trait]
impl EmbeddingPort for FixedEmbedder {
    fn dimension(&self) -> usize {
        self.0.len()
    }

    async fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
        Ok(Embedding::new(self.0.clone()))
    }
}

// ==================== Oracle ====================

pub(crate) enum OracleScript {
    Plan(Plan),
    Fail(String),
    Hang,
}

pub(crate) struct ScriptedOracle {
    name: String,
    responses: Mutex<VecDeque<OracleScript>>,
    pub requests: Mutex<Vec<PlanTier>>,
}

impl ScriptedOracle {
    pub fn new(name: &str, responses: Vec<OracleScript>) -> Self {
        Self {
            name: name.to_string(),
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PlanOracle for ScriptedOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn propose(&self, request: &PlanRequest) -> Result<Plan, OracleError> {
        self.requests.lock().unwrap().push(request.tier);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(OracleScript::Plan(plan)) => Ok(plan),
            Some(OracleScript::Fail(message)) => Err(OracleError::RequestFailed(message)),
            Some(OracleScript::Hang) => std::future::pending().await,
            None => Err(OracleError::Other("no scripted response".to_string())),
        }
    }
}

// ==================== Invoker ====================

/// Scripted behaviour of one step.
#[derive(Clone)]
pub(crate) struct StepScript {
    pub delay: Duration,
    /// Number of leading attempts that fail.
    pub failures: u32,
    pub output: Value,
}

impl StepScript {
    pub fn ok(output: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            failures: 0,
            output,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, failures: u32) -> Self {
        self.failures = failures;
        self
    }
}

#[derive(Default)]
pub(crate) struct ScriptedInvoker {
    scripts: HashMap<String, StepScript>,
    pub events: Mutex<Vec<String>>,
    pub credentials: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    pub fn with(mut self, step: &str, script: StepScript) -> Self {
        self.scripts.insert(step.to_string(), script);
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn attempts(&self, step: &str) -> usize {
        let start = format!("start:{}", step);
        self.events().iter().filter(|e| **e == start).count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

#[async_trait]
impl ToolInvokerPort for ScriptedInvoker {
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<Value, ToolError> {
        let step = invocation.step_id.to_string();
        self.events.lock().unwrap().push(format!("start:{}", step));
        self.credentials
            .lock()
            .unwrap()
            .push(invocation.credential.clone());

        let script = self
            .scripts
            .get(&step)
            .cloned()
            .unwrap_or_else(|| StepScript::ok(json!({})));
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        self.events.lock().unwrap().push(format!("end:{}", step));

        if invocation.attempt <= script.failures {
            Err(ToolError::unavailable(format!("{} attempt {}", step, invocation.attempt)))
        } else {
            Ok(script.output)
        }
    }
}

// ==================== Escrow ====================

#[derive(Default)]
pub(crate) struct CountingEscrow {
    acquired: AtomicUsize,
    pub revoked: Mutex<Vec<String>>,
    denied_tools: HashSet<String>,
}

impl CountingEscrow {
    pub fn denying(tool: &str) -> Self {
        Self {
            denied_tools: HashSet::from([tool.to_string()]),
            ..Default::default()
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn outstanding(&self) -> usize {
        self.acquired() - self.revoked.lock().unwrap().len()
    }
}

#[async_trait]
impl CredentialEscrow for CountingEscrow {
    async fn acquire(&self, request: &CredentialRequest) -> Result<CredentialGrant, EscrowError> {
        if self.denied_tools.contains(&request.tool.name) {
            return Err(EscrowError::Denied(request.tool.to_string()));
        }
        let n = self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(CredentialGrant {
            id: format!("grant-{}", n),
            token: format!("token-{}", n),
            expires_at: Utc::now(),
        })
    }

    async fn revoke(&self, grant_id: &str) -> Result<(), EscrowError> {
        self.revoked.lock().unwrap().push(grant_id.to_string());
        Ok(())
    }
}

// ==================== Audit ====================

#[derive(Default)]
pub(crate) struct RecordingAudit {
    pub events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAudit {
    pub fn types(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind.as_str()).collect()
    }
}

impl AuditLogger for RecordingAudit {
    fn log(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}
