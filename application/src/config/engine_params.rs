//! Engine parameters: discovery, planning and execution control.
//!
//! [`EngineParams`] groups the static knobs the use cases read at runtime.
//! They are application-layer concerns, not domain policy: a plan's own
//! security constraints still bound what it may do.

use conductor_domain::EscalationThresholds;
use conductor_domain::tool::discovery::DEFAULT_SIMILARITY_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine control parameters.
///
/// | Parameter | Used by |
/// |-----------|---------|
/// | `similarity_threshold`, `top_k` | DiscoverTools |
/// | `oracle_timeout`, `escalation` | GeneratePlan, Escalate |
/// | `max_parallel_steps`, `tenant_concurrency`, `credential_ttl` | ExecutePlan |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineParams {
    /// Minimum similarity for a tool to be considered a candidate.
    pub similarity_threshold: f32,
    /// Maximum number of candidate tools handed to the oracle.
    pub top_k: usize,
    /// Upper bound on concurrently running steps of one plan.
    pub max_parallel_steps: usize,
    /// Concurrent tool invocations allowed per tenant across all requests.
    pub tenant_concurrency: usize,
    /// Request-level timeout for one oracle call.
    pub oracle_timeout: Duration,
    /// Lifetime requested for each per-attempt credential.
    pub credential_ttl: Duration,
    /// Thresholds deciding low to high tier escalation.
    pub escalation: EscalationThresholds,
    /// Accept plans without an attestation (hand-written plan files).
    pub allow_unsealed_plans: bool,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: 5,
            max_parallel_steps: 4,
            tenant_concurrency: 8,
            oracle_timeout: Duration::from_secs(30),
            credential_ttl: Duration::from_secs(60),
            escalation: EscalationThresholds::default(),
            allow_unsealed_plans: false,
        }
    }
}

impl EngineParams {
    // ==================== Builder Methods ====================

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_parallel_steps(mut self, max: usize) -> Self {
        self.max_parallel_steps = max;
        self
    }

    pub fn with_tenant_concurrency(mut self, max: usize) -> Self {
        self.tenant_concurrency = max;
        self
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = ttl;
        self
    }

    pub fn with_escalation(mut self, thresholds: EscalationThresholds) -> Self {
        self.escalation = thresholds;
        self
    }

    pub fn allow_unsealed_plans(mut self) -> Self {
        self.allow_unsealed_plans = true;
        self
    }

    /// Parallelism actually used by the scheduler (never zero).
    pub fn effective_parallelism(&self) -> usize {
        self.max_parallel_steps.max(1)
    }
}
