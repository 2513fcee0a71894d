//! Per-run bookkeeping of step outcomes.

use conductor_domain::{
    BindingScope, FailurePolicy, Plan, StepFailure, StepId, StepOutcome, StepStatus,
};
use serde_json::Value;
use std::collections::HashMap;

/// Whether a pending step may start.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Gate {
    Ready,
    Waiting,
    Blocked(StepId),
}

pub(super) struct RunState<'p> {
    plan: &'p Plan,
    outcomes: Vec<StepOutcome>,
    index: HashMap<&'p StepId, usize>,
    /// First step whose failure ends the run
    fatal: Option<StepId>,
}

impl<'p> RunState<'p> {
    pub fn new(plan: &'p Plan) -> Self {
        Self {
            plan,
            outcomes: plan.steps.iter().map(StepOutcome::pending).collect(),
            index: plan
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| (&step.id, i))
                .collect(),
            fatal: None,
        }
    }

    pub fn status(&self, idx: usize) -> StepStatus {
        self.outcomes[idx].status
    }

    pub fn fatal(&self) -> Option<&StepId> {
        self.fatal.as_ref()
    }

    pub fn gate(&self, idx: usize) -> Gate {
        let mut waiting = false;
        for dep in &self.plan.steps[idx].depends_on {
            match self.index.get(dep).map(|&d| self.outcomes[d].status) {
                Some(status) if status.satisfies_dependency() => {}
                Some(status) if status.is_terminal() => return Gate::Blocked(dep.clone()),
                Some(_) => waiting = true,
                None => return Gate::Blocked(dep.clone()),
            }
        }
        if waiting { Gate::Waiting } else { Gate::Ready }
    }

    /// Bindings visible to a step: the outputs of its own dependencies.
    pub fn scope_for(&self, idx: usize) -> BindingScope {
        let mut scope = BindingScope::new();
        for dep in &self.plan.steps[idx].depends_on {
            if let Some(&d) = self.index.get(dep)
                && let Some(output) = &self.outcomes[d].output
            {
                let producer = &self.plan.steps[d];
                scope.bind(
                    producer.id.as_str(),
                    producer.output_binding.as_deref(),
                    output.clone(),
                );
            }
        }
        scope
    }

    pub fn mark_running(&mut self, idx: usize) {
        self.outcomes[idx].status = StepStatus::Running;
    }

    pub fn succeed(&mut self, idx: usize, attempts: u32, output: Value, duration_ms: u64) -> &StepOutcome {
        let outcome = &mut self.outcomes[idx];
        outcome.status = StepStatus::Succeeded;
        outcome.attempts = attempts;
        outcome.output = Some(output);
        outcome.duration_ms = duration_ms;
        outcome
    }

    pub fn skip(&mut self, idx: usize) -> &StepOutcome {
        self.outcomes[idx].status = StepStatus::Skipped;
        &self.outcomes[idx]
    }

    /// Record a non-successful terminal state.
    ///
    /// A `Failed` critical step, or any `Failed` step under fail-fast,
    /// becomes the run's fatal failure.
    pub fn fail(
        &mut self,
        idx: usize,
        status: StepStatus,
        failure: StepFailure,
        attempts: u32,
        duration_ms: u64,
    ) -> &StepOutcome {
        let step = &self.plan.steps[idx];
        if status == StepStatus::Failed
            && self.fatal.is_none()
            && (step.critical || self.plan.on_tool_failure == FailurePolicy::FailFast)
        {
            self.fatal = Some(step.id.clone());
        }

        let outcome = &mut self.outcomes[idx];
        outcome.status = status;
        outcome.failure = Some(failure);
        outcome.attempts = attempts;
        outcome.duration_ms = duration_ms;
        outcome
    }

    /// Cancel every step that never started.
    pub fn cancel_pending(&mut self, reason: &str) -> Vec<usize> {
        let pending: Vec<usize> = (0..self.outcomes.len())
            .filter(|&i| self.outcomes[i].status == StepStatus::Pending)
            .collect();
        for &i in &pending {
            self.outcomes[i].status = StepStatus::Cancelled;
            self.outcomes[i].failure = Some(StepFailure::Cancelled {
                reason: reason.to_string(),
            });
        }
        pending
    }

    pub fn outcome(&self, idx: usize) -> &StepOutcome {
        &self.outcomes[idx]
    }

    pub fn into_outcomes(self) -> Vec<StepOutcome> {
        self.outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{PlanTier, Step};
    use serde_json::json;

    fn plan(policy: FailurePolicy) -> Plan {
        Plan::new("g", PlanTier::Low)
            .with_step(Step::new("a", "T").with_output_binding("first"))
            .with_step(Step::new("b", "T").with_dependency("a"))
            .with_step(Step::new("c", "T"))
            .with_failure_policy(policy)
    }

    #[test]
    fn test_gate_follows_dependencies() {
        let plan = plan(FailurePolicy::GracefulDegradation);
        let mut state = RunState::new(&plan);
        assert_eq!(state.gate(0), Gate::Ready);
        assert_eq!(state.gate(1), Gate::Waiting);

        state.mark_running(0);
        assert_eq!(state.gate(1), Gate::Waiting);

        state.succeed(0, 1, json!({"id": 7}), 5);
        assert_eq!(state.gate(1), Gate::Ready);
        let scope = state.scope_for(1);
        assert_eq!(scope.get("first"), Some(&json!({"id": 7})));
        assert_eq!(scope.get("a"), Some(&json!({"id": 7})));
        assert!(state.scope_for(2).is_empty());
    }

    #[test]
    fn test_failed_dependency_blocks() {
        let plan = plan(FailurePolicy::GracefulDegradation);
        let mut state = RunState::new(&plan);
        state.fail(
            0,
            StepStatus::Failed,
            StepFailure::Timeout { timeout_ms: 10 },
            1,
            10,
        );
        assert_eq!(state.gate(1), Gate::Blocked(StepId::new("a")));
        assert!(state.fatal().is_none());
    }

    #[test]
    fn test_fail_fast_marks_fatal() {
        let plan = plan(FailurePolicy::FailFast);
        let mut state = RunState::new(&plan);
        state.fail(
            2,
            StepStatus::Failed,
            StepFailure::Timeout { timeout_ms: 10 },
            1,
            10,
        );
        assert_eq!(state.fatal(), Some(&StepId::new("c")));

        let cancelled = state.cancel_pending("halted");
        assert_eq!(cancelled, vec![0, 1]);
        assert_eq!(state.status(1), StepStatus::Cancelled);
    }
}
