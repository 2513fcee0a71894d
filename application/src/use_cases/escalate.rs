//! Escalate use case
//!
//! Applies the escalation criteria to a low-tier draft and, when they fire,
//! re-plans once at the high tier. The [`PlanningSession`] carries the
//! once-per-request guarantee: a second escalation attempt in the same
//! session returns the draft unchanged.

use super::generate_plan::{GeneratePlanUseCase, PlanGenerationError};
use crate::ports::plan_oracle::PlanRequest;
use conductor_domain::{EscalationAssessment, EscalationThresholds, Plan, PlanTier, assess};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum EscalationError {
    #[error("Escalation failed: {0}")]
    EscalationFailed(#[source] PlanGenerationError),
}

impl EscalationError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            EscalationError::EscalationFailed(e) => e.is_cancelled(),
        }
    }
}

/// Per-request planning state.
#[derive(Debug, Default)]
pub struct PlanningSession {
    escalated: bool,
}

impl PlanningSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_escalated(&self) -> bool {
        self.escalated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationDecision {
    /// No criterion fired
    NotNeeded,
    /// Re-planned at the high tier
    Escalated,
    /// The context forbids escalation
    NotPermitted,
    /// This session already escalated once
    AlreadyEscalated,
}

#[derive(Debug, Clone)]
pub struct EscalationOutcome {
    pub plan: Plan,
    pub assessment: EscalationAssessment,
    pub decision: EscalationDecision,
}

pub struct EscalateUseCase {
    generator: Arc<GeneratePlanUseCase>,
    thresholds: EscalationThresholds,
}

impl EscalateUseCase {
    pub fn new(generator: Arc<GeneratePlanUseCase>, thresholds: EscalationThresholds) -> Self {
        Self {
            generator,
            thresholds,
        }
    }

    /// Escalate `draft` if the criteria demand it and the session allows it.
    ///
    /// `request` is the request that produced the draft; its goal, candidates
    /// and context are reused for the high-tier call.
    pub async fn escalate(
        &self,
        draft: Plan,
        request: &PlanRequest,
        session: &mut PlanningSession,
    ) -> Result<EscalationOutcome, EscalationError> {
        let assessment = assess(&draft, &request.candidates, &self.thresholds);

        let decision = if !assessment.should_escalate() {
            EscalationDecision::NotNeeded
        } else if !request.context.allow_escalation {
            EscalationDecision::NotPermitted
        } else if session.escalated || draft.tier == PlanTier::High {
            EscalationDecision::AlreadyEscalated
        } else {
            EscalationDecision::Escalated
        };

        if decision != EscalationDecision::Escalated {
            if assessment.should_escalate() {
                warn!(plan_id = %draft.id, decision = ?decision, "Escalation criteria met but not escalating");
            }
            return Ok(EscalationOutcome {
                plan: draft,
                assessment,
                decision,
            });
        }

        let reasons: Vec<String> = assessment.reasons.iter().map(ToString::to_string).collect();
        info!(plan_id = %draft.id, reasons = ?reasons, "Escalating to high tier");

        // a failed high-tier call still uses up the session's escalation
        session.escalated = true;
        let mut high = request.clone().with_previous_draft(draft);
        high.tier = PlanTier::High;

        let plan = self
            .generator
            .generate(&high)
            .await
            .map_err(EscalationError::EscalationFailed)?;

        Ok(EscalationOutcome {
            plan,
            assessment,
            decision,
        })
    }
}
