//! Plan Oracle port
//!
//! A plan oracle turns a goal plus candidate tools into a [`Plan`]. Oracles
//! are untrusted: whatever they return is contract-checked, sealed and
//! validated before anything runs.
//!
//! Oracles come in two tiers. [`TieredOracles`] selects the adapter for a
//! [`PlanTier`], so the engine never knows which model sits behind a tier.

use async_trait::async_trait;
use conductor_domain::{ExecutionContext, Goal, Plan, PlanTier, Tool};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during oracle calls
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Everything an oracle sees when asked for a plan.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub goal: Goal,
    pub candidates: Vec<Tool>,
    pub context: Arc<ExecutionContext>,
    pub tier: PlanTier,
    /// The low-tier draft being escalated, if any.
    pub previous_draft: Option<Plan>,
}

impl PlanRequest {
    pub fn new(goal: Goal, candidates: Vec<Tool>, context: Arc<ExecutionContext>, tier: PlanTier) -> Self {
        Self {
            goal,
            candidates,
            context,
            tier,
            previous_draft: None,
        }
    }

    pub fn with_previous_draft(mut self, draft: Plan) -> Self {
        self.previous_draft = Some(draft);
        self
    }
}

/// Port for plan generation
#[async_trait]
pub trait PlanOracle: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Propose a plan. The result is untrusted.
    async fn propose(&self, request: &PlanRequest) -> Result<Plan, OracleError>;
}

/// One oracle per tier.
#[derive(Clone)]
pub struct TieredOracles {
    low: Arc<dyn PlanOracle>,
    high: Arc<dyn PlanOracle>,
}

impl TieredOracles {
    pub fn new(low: Arc<dyn PlanOracle>, high: Arc<dyn PlanOracle>) -> Self {
        Self { low, high }
    }

    /// Both tiers served by the same oracle.
    pub fn single(oracle: Arc<dyn PlanOracle>) -> Self {
        Self {
            low: oracle.clone(),
            high: oracle,
        }
    }

    pub fn for_tier(&self, tier: PlanTier) -> &Arc<dyn PlanOracle> {
        match tier {
            PlanTier::Low => &self.low,
            PlanTier::High => &self.high,
        }
    }
}
