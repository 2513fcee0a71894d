//! Audit trail port.
//!
//! Every event is attributed to a plan and the tenant it ran for; step
//! events also name the step. Event-specific fields travel in `detail`.
//! `tracing` carries diagnostics; this port carries the record of what a
//! plan did.

use conductor_domain::{PlanId, StepId};
use serde::Serialize;
use serde_json::Value;

/// Lifecycle point an audit event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    PlanGenerated,
    PlanEscalated,
    PlanValidated,
    PlanRejected,
    StepStarted,
    StepFinished,
    PlanFinished,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::PlanGenerated => "plan_generated",
            AuditKind::PlanEscalated => "plan_escalated",
            AuditKind::PlanValidated => "plan_validated",
            AuditKind::PlanRejected => "plan_rejected",
            AuditKind::StepStarted => "step_started",
            AuditKind::StepFinished => "step_finished",
            AuditKind::PlanFinished => "plan_finished",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub plan_id: PlanId,
    pub tenant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    pub detail: Value,
}

impl AuditEvent {
    /// Plan-level event.
    pub fn plan(kind: AuditKind, plan_id: &PlanId, tenant: &str, detail: Value) -> Self {
        Self {
            kind,
            plan_id: plan_id.clone(),
            tenant: tenant.to_string(),
            step_id: None,
            detail,
        }
    }

    /// Event about one step of a plan.
    pub fn step(kind: AuditKind, plan_id: &PlanId, tenant: &str, step_id: &StepId, detail: Value) -> Self {
        Self {
            step_id: Some(step_id.clone()),
            ..Self::plan(kind, plan_id, tenant, detail)
        }
    }
}

/// Sink for audit events.
///
/// `log` cannot fail: a broken sink is reported by the adapter and never
/// changes the outcome of a run.
pub trait AuditLogger: Send + Sync {
    fn log(&self, event: AuditEvent);
}

pub struct NoAuditLogger;

impl AuditLogger for NoAuditLogger {
    fn log(&self, _event: AuditEvent) {}
}
