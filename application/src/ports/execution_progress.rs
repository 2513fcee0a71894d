//! Execution progress port.
//!
//! [`ExecutionProgressNotifier`] is an **output port** that the presentation
//! layer implements to display planning and execution progress. All
//! callback argument types come from the domain layer.
//!
//! All methods have default no-op implementations, so implementers only
//! need to override the callbacks they care about.

use conductor_domain::{
    EscalationAssessment, ExecutionReport, Plan, Step, StepFailure, StepOutcome, ToolMatch,
    ValidationReport,
};
use std::time::Duration;

pub trait ExecutionProgressNotifier: Send + Sync {
    /// Called once candidate tools are known
    fn on_candidates(&self, _candidates: &[ToolMatch]) {}

    /// Called when an oracle returns an accepted plan
    fn on_plan_generated(&self, _plan: &Plan) {}

    /// Called after a draft has been assessed for escalation
    fn on_escalation_assessed(&self, _assessment: &EscalationAssessment, _escalating: bool) {}

    /// Called after validation, whatever the verdict
    fn on_validation(&self, _report: &ValidationReport) {}

    /// Called when a step attempt starts
    fn on_step_start(&self, _step: &Step, _attempt: u32) {}

    /// Called before a retry backoff
    fn on_step_retry(&self, _step: &Step, _attempt: u32, _failure: &StepFailure, _delay: Duration) {}

    /// Called when a step reaches a terminal state
    fn on_step_complete(&self, _outcome: &StepOutcome) {}

    /// Called when the whole plan has finished
    fn on_plan_complete(&self, _report: &ExecutionReport) {}
}

/// No-op implementation
pub struct NoExecutionProgress;

impl ExecutionProgressNotifier for NoExecutionProgress {}
