//! Generate plan use case
//!
//! Asks the oracle of a tier for a plan under a request-level timeout, then
//! holds the result to the oracle contract:
//!
//! - the engine assigns a fresh id and the tier
//! - confidence must be finite and in `[0, 1]`
//! - at least one step
//! - every step uses a candidate tool; an unpinned step is pinned to the
//!   candidate's version, a pin to any other version is a breach
//!
//! Accepted plans are sealed against the current catalog snapshot.

use super::shared;
use crate::ports::plan_oracle::{OracleError, PlanRequest, TieredOracles};
use crate::ports::tool_registry::ToolRegistryPort;
use conductor_domain::plan::{AttestationError, seal};
use conductor_domain::{Plan, PlanId, PlanTier};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PlanGenerationError {
    #[error("{tier} oracle failed: {source}")]
    Oracle {
        tier: PlanTier,
        #[source]
        source: OracleError,
    },

    #[error("{tier} oracle timed out after {timeout_ms}ms")]
    Timeout { tier: PlanTier, timeout_ms: u64 },

    #[error("{tier} plan breaks the oracle contract: {reason}")]
    ContractBreach { tier: PlanTier, reason: String },

    #[error("Failed to seal plan: {0}")]
    Attestation(#[from] AttestationError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl PlanGenerationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlanGenerationError::Cancelled)
    }
}

pub struct GeneratePlanUseCase {
    oracles: TieredOracles,
    registry: Arc<dyn ToolRegistryPort>,
    timeout: Duration,
    cancellation_token: Option<CancellationToken>,
}

impl GeneratePlanUseCase {
    pub fn new(oracles: TieredOracles, registry: Arc<dyn ToolRegistryPort>, timeout: Duration) -> Self {
        Self {
            oracles,
            registry,
            timeout,
            cancellation_token: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub async fn generate(&self, request: &PlanRequest) -> Result<Plan, PlanGenerationError> {
        let tier = request.tier;
        if shared::is_cancelled(&self.cancellation_token) {
            return Err(PlanGenerationError::Cancelled);
        }

        let oracle = self.oracles.for_tier(tier);
        info!(tier = %tier, oracle = oracle.name(), candidates = request.candidates.len(), "Requesting plan");

        let proposed = tokio::select! {
            biased;
            _ = shared::cancelled(&self.cancellation_token) => {
                return Err(PlanGenerationError::Cancelled);
            }
            result = tokio::time::timeout(self.timeout, oracle.propose(request)) => match result {
                Err(_) => {
                    return Err(PlanGenerationError::Timeout {
                        tier,
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
                Ok(result) => result.map_err(|source| PlanGenerationError::Oracle { tier, source })?,
            },
        };

        let mut plan = enforce_contract(proposed, request).map_err(|reason| {
            warn!(tier = %tier, reason = %reason, "Oracle contract breach");
            PlanGenerationError::ContractBreach { tier, reason }
        })?;

        seal(&mut plan, &self.registry.snapshot())?;
        info!(
            plan_id = %plan.id,
            tier = %tier,
            steps = plan.steps.len(),
            confidence = plan.confidence,
            "Plan generated"
        );
        Ok(plan)
    }
}

/// Normalize an oracle plan or explain why it is unacceptable.
pub(crate) fn enforce_contract(mut plan: Plan, request: &PlanRequest) -> Result<Plan, String> {
    plan.id = PlanId::generate();
    plan.tier = request.tier;
    plan.attestation = None;
    if plan.goal.trim().is_empty() {
        plan.goal = request.goal.as_str().to_string();
    }

    if !plan.confidence.is_finite() || !(0.0..=1.0).contains(&plan.confidence) {
        return Err(format!("confidence {} outside [0, 1]", plan.confidence));
    }
    if plan.steps.is_empty() {
        return Err("plan has no steps".to_string());
    }

    for step in &mut plan.steps {
        let Some(candidate) = request.candidates.iter().find(|t| t.name == step.tool) else {
            return Err(format!(
                "step '{}' uses '{}', which is not a candidate tool",
                step.id, step.tool
            ));
        };
        match step.tool_version {
            None => step.tool_version = Some(candidate.version),
            Some(version) if version != candidate.version => {
                return Err(format!(
                    "step '{}' pins {}@{} but the candidate is {}",
                    step.id,
                    step.tool,
                    version,
                    candidate.key()
                ));
            }
            Some(_) => {}
        }
    }
    Ok(plan)
}
