//! Execution outcome model.
//!
//! Per step:
//!
//! ```text
//! Pending ──(condition false)──▶ Skipped
//!    │ └──(dependency failed)──▶ Blocked
//!    │ └──(deadline / cancel)──▶ Cancelled
//!    ▼
//! Running ──▶ Succeeded
//!    │  ▲
//!    ▼  │ retry (bounded)
//!  Failed
//! ```
//!
//! Per plan, [`PlanStatus::conclude`] derives the terminal status from the
//! step outcomes, the plan's policies and how the run ended.

use crate::plan::{FailurePolicy, Plan, PlanId, StepId, TimeoutPolicy};
use crate::tool::{ToolError, ToolVersion};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
    /// Never ran because a dependency failed
    Blocked,
    Cancelled,
}

impl StepStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Blocked => "blocked",
            StepStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::Pending | StepStatus::Running)
    }

    /// Whether a dependent step may start after this one.
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Skipped)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a step did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailure {
    #[error("binding resolution failed: {message}")]
    BindingResolution { message: String },

    #[error("step timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("exhausted {attempts} attempts, last error: {last}")]
    ExhaustedRetries { attempts: u32, last: Box<StepFailure> },

    #[error("tool failed: {error}")]
    ToolFailed { error: ToolError },

    #[error("output does not match schema: {message}")]
    OutputSchemaMismatch { message: String },

    #[error("credential denied: {message}")]
    CredentialDenied { message: String },

    #[error("dependency '{dependency}' did not succeed")]
    DependencyFailed { dependency: StepId },

    #[error("cancelled: {reason}")]
    Cancelled { reason: String },
}

impl StepFailure {
    /// Failures that another attempt could plausibly fix.
    ///
    /// Binding resolution is deterministic for a given scope, so it is never
    /// retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StepFailure::Timeout { .. }
                | StepFailure::ToolFailed { .. }
                | StepFailure::OutputSchemaMismatch { .. }
                | StepFailure::CredentialDenied { .. }
        )
    }

    pub fn kind(&self) -> &str {
        match self {
            StepFailure::BindingResolution { .. } => "binding_resolution",
            StepFailure::Timeout { .. } => "timeout",
            StepFailure::ExhaustedRetries { .. } => "exhausted_retries",
            StepFailure::ToolFailed { .. } => "tool_failed",
            StepFailure::OutputSchemaMismatch { .. } => "output_schema_mismatch",
            StepFailure::CredentialDenied { .. } => "credential_denied",
            StepFailure::DependencyFailed { .. } => "dependency_failed",
            StepFailure::Cancelled { .. } => "cancelled",
        }
    }

    /// The innermost failure, looking through retry exhaustion.
    pub fn root(&self) -> &StepFailure {
        match self {
            StepFailure::ExhaustedRetries { last, .. } => last.root(),
            other => other,
        }
    }
}

/// Final record of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub step_id: StepId,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<ToolVersion>,
    pub status: StepStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
    pub duration_ms: u64,
}

impl StepOutcome {
    pub fn pending(step: &crate::plan::Step) -> Self {
        Self {
            step_id: step.id.clone(),
            tool: step.tool.clone(),
            tool_version: step.tool_version,
            status: StepStatus::Pending,
            attempts: 0,
            output: None,
            failure: None,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Validated,
    Executing,
    Completed,
    PartiallyCompleted,
    Failed,
    Rejected,
}

impl PlanStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PlanStatus::Validated => "validated",
            PlanStatus::Executing => "executing",
            PlanStatus::Completed => "completed",
            PlanStatus::PartiallyCompleted => "partially_completed",
            PlanStatus::Failed => "failed",
            PlanStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed
                | PlanStatus::PartiallyCompleted
                | PlanStatus::Failed
                | PlanStatus::Rejected
        )
    }

    /// Terminal status of an executed plan.
    pub fn conclude(plan: &Plan, outcomes: &[StepOutcome], end: RunEnd) -> Self {
        match end {
            RunEnd::Cancelled => return PlanStatus::Failed,
            RunEnd::DeadlineExceeded => {
                return match plan.security.on_timeout {
                    TimeoutPolicy::PartialResults => PlanStatus::PartiallyCompleted,
                    TimeoutPolicy::Fail => PlanStatus::Failed,
                };
            }
            RunEnd::Finished => {}
        }

        let failed: Vec<&StepOutcome> = outcomes
            .iter()
            .filter(|o| o.status == StepStatus::Failed)
            .collect();
        let critical_failed = failed
            .iter()
            .any(|o| plan.step(&o.step_id).is_some_and(|s| s.critical));

        if critical_failed
            || (!failed.is_empty() && plan.on_tool_failure == FailurePolicy::FailFast)
        {
            return PlanStatus::Failed;
        }

        if outcomes.iter().all(|o| o.status.satisfies_dependency()) {
            PlanStatus::Completed
        } else {
            PlanStatus::PartiallyCompleted
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEnd {
    /// Every step reached a terminal state on its own
    Finished,
    /// The plan's `max_execution_time_ms` passed
    DeadlineExceeded,
    /// The caller cancelled
    Cancelled,
}

/// Aggregated result of executing a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub plan_id: PlanId,
    pub status: PlanStatus,
    pub end: RunEnd,
    pub steps: Vec<StepOutcome>,
    pub duration_ms: u64,
}

impl ExecutionReport {
    pub fn outcome(&self, step: &StepId) -> Option<&StepOutcome> {
        self.steps.iter().find(|o| &o.step_id == step)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|o| o.status == status).count()
    }

    /// Outputs of succeeded steps keyed by step id.
    pub fn bound_outputs(&self) -> Map<String, Value> {
        self.steps
            .iter()
            .filter_map(|o| {
                o.output
                    .as_ref()
                    .filter(|_| o.is_success())
                    .map(|v| (o.step_id.to_string(), v.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanTier, SecurityConstraints, Step};
    use serde_json::json;

    fn plan(policy: FailurePolicy) -> Plan {
        Plan::new("g", PlanTier::Low)
            .with_step(Step::new("a", "T"))
            .with_step(Step::new("b", "T").with_dependency("a"))
            .with_step(Step::new("c", "T"))
            .with_failure_policy(policy)
    }

    fn outcomes(plan: &Plan, statuses: &[StepStatus]) -> Vec<StepOutcome> {
        plan.steps
            .iter()
            .zip(statuses)
            .map(|(step, status)| StepOutcome {
                status: *status,
                ..StepOutcome::pending(step)
            })
            .collect()
    }

    use StepStatus::*;

    #[test]
    fn test_conclude_completed() {
        let plan = plan(FailurePolicy::FailFast);
        let all = outcomes(&plan, &[Succeeded, Skipped, Succeeded]);
        assert_eq!(PlanStatus::conclude(&plan, &all, RunEnd::Finished), PlanStatus::Completed);
    }

    #[test]
    fn test_conclude_failure_policies() {
        let fail_fast = plan(FailurePolicy::FailFast);
        let graceful = plan(FailurePolicy::GracefulDegradation);
        let statuses = [Failed, Blocked, Succeeded];

        assert_eq!(
            PlanStatus::conclude(&fail_fast, &outcomes(&fail_fast, &statuses), RunEnd::Finished),
            PlanStatus::Failed
        );
        assert_eq!(
            PlanStatus::conclude(&graceful, &outcomes(&graceful, &statuses), RunEnd::Finished),
            PlanStatus::PartiallyCompleted
        );

        let mut critical = graceful.clone();
        critical.steps[0].critical = true;
        assert_eq!(
            PlanStatus::conclude(&critical, &outcomes(&critical, &statuses), RunEnd::Finished),
            PlanStatus::Failed
        );
    }

    #[test]
    fn test_conclude_deadline_and_cancel() {
        let mut plan = plan(FailurePolicy::FailFast);
        let statuses = outcomes(&plan, &[Failed, Cancelled, Succeeded]);
        assert_eq!(
            PlanStatus::conclude(&plan, &statuses, RunEnd::DeadlineExceeded),
            PlanStatus::Failed
        );

        plan.security = SecurityConstraints {
            on_timeout: TimeoutPolicy::PartialResults,
            ..SecurityConstraints::default()
        };
        assert_eq!(
            PlanStatus::conclude(&plan, &statuses, RunEnd::DeadlineExceeded),
            PlanStatus::PartiallyCompleted
        );
        assert_eq!(
            PlanStatus::conclude(&plan, &statuses, RunEnd::Cancelled),
            PlanStatus::Failed
        );
    }

    #[test]
    fn test_failure_retryability_and_root() {
        let tool = StepFailure::ToolFailed {
            error: ToolError::unavailable("down"),
        };
        assert!(tool.is_retryable());
        assert!(!StepFailure::BindingResolution { message: "x".into() }.is_retryable());

        let exhausted = StepFailure::ExhaustedRetries {
            attempts: 3,
            last: Box::new(tool.clone()),
        };
        assert_eq!(exhausted.root(), &tool);
        assert_eq!(
            exhausted.to_string(),
            "exhausted 3 attempts, last error: tool failed: [UNAVAILABLE] down"
        );
        assert_eq!(
            serde_json::to_value(&exhausted).unwrap()["kind"],
            json!("exhausted_retries")
        );
    }

    #[test]
    fn test_bound_outputs_only_from_successes() {
        let plan = plan(FailurePolicy::GracefulDegradation);
        let mut steps = outcomes(&plan, &[Succeeded, Failed, Succeeded]);
        steps[0].output = Some(json!({"x": 1}));
        steps[1].output = Some(json!({"partial": true}));
        let report = ExecutionReport {
            plan_id: plan.id.clone(),
            status: PlanStatus::PartiallyCompleted,
            end: RunEnd::Finished,
            steps,
            duration_ms: 0,
        };
        let bound = report.bound_outputs();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound["a"], json!({"x": 1}));
        assert_eq!(report.count(Succeeded), 2);
    }
}
