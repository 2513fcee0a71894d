//! Execute plan use case
//!
//! Runs a [`ValidatedPlan`] to a terminal [`ExecutionReport`].
//!
//! # Scheduling
//!
//! The scheduler is a single loop over a [`FuturesUnordered`] of step
//! futures. Each pass starts every pending step whose dependencies are
//! Succeeded or Skipped, up to `max_parallel_steps`; a step whose dependency
//! ended any other way is Blocked. Conditions are evaluated and inputs
//! resolved against the outputs of the step's own dependencies only.
//!
//! # Attempts
//!
//! Every attempt takes a per-tenant slot from the [`TenantLimiter`], acquires
//! a credential right before invocation and revokes it on every exit path.
//! Failed attempts are retried with exponential backoff up to
//! `max_retries + 1` attempts; binding failures are never retried.
//!
//! # Deadline and cancellation
//!
//! The plan's `max_execution_time_ms` and the caller's token both cancel a
//! per-plan child token. Running steps observe it at their next await point
//! (deadline: `Timeout`, caller: `Cancelled`); steps that never started are
//! Cancelled. Succeeded outputs are kept.

mod limiter;
mod state;

pub use limiter::TenantLimiter;

use self::state::{Gate, RunState};
use super::shared;
use super::validate_plan::ValidatedPlan;
use crate::config::EngineParams;
use crate::ports::audit_logger::{AuditEvent, AuditKind, AuditLogger, NoAuditLogger};
use crate::ports::credential_escrow::{CredentialEscrow, CredentialRequest, ScopedGrant};
use crate::ports::execution_progress::{ExecutionProgressNotifier, NoExecutionProgress};
use crate::ports::tool_invoker::{ToolInvocation, ToolInvokerPort};
use crate::ports::tool_registry::ToolRegistryPort;
use conductor_domain::plan::resolve_inputs;
use conductor_domain::{
    Condition, ExecutionContext, ExecutionReport, Plan, PlanId, PlanStatus, RunEnd, Step,
    StepFailure, StepId, StepOutcome, StepStatus, Tool, ToolCatalog, ToolError,
};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

enum AttemptError {
    Failed(StepFailure),
    /// The plan token was cancelled mid-attempt
    Interrupted,
}

/// Result of one step future.
struct StepRun {
    idx: usize,
    attempts: u32,
    result: Result<Value, AttemptError>,
    duration_ms: u64,
}

/// Work handed to a step future.
struct StepTask {
    idx: usize,
    tool: Tool,
    input: Map<String, Value>,
    plan_id: PlanId,
    context: Arc<ExecutionContext>,
    token: CancellationToken,
}

/// What stopped the scheduler before every step finished on its own.
enum Interruption {
    None,
    Halted(StepId),
    Deadline(u64),
    Caller,
}

impl Interruption {
    /// Terminal state of a step that was running when the run stopped.
    fn running_outcome(&self) -> (StepStatus, StepFailure) {
        match self {
            Interruption::Deadline(timeout_ms) => (
                StepStatus::Failed,
                StepFailure::Timeout {
                    timeout_ms: *timeout_ms,
                },
            ),
            other => (
                StepStatus::Cancelled,
                StepFailure::Cancelled {
                    reason: other.reason(),
                },
            ),
        }
    }

    fn reason(&self) -> String {
        match self {
            Interruption::None => "step never became eligible".to_string(),
            Interruption::Halted(step) => format!("plan halted after step '{}' failed", step),
            Interruption::Deadline(_) => "execution deadline exceeded".to_string(),
            Interruption::Caller => "cancelled by caller".to_string(),
        }
    }
}

/// Shared, per-run values the scheduler hands to step futures.
struct RunEnv<'a> {
    plan: &'a Plan,
    catalog: Arc<ToolCatalog>,
    context: Arc<ExecutionContext>,
    token: CancellationToken,
    progress: &'a dyn ExecutionProgressNotifier,
}

pub struct ExecutePlanUseCase {
    registry: Arc<dyn ToolRegistryPort>,
    invoker: Arc<dyn ToolInvokerPort>,
    escrow: Arc<dyn CredentialEscrow>,
    limiter: Arc<TenantLimiter>,
    params: EngineParams,
    audit: Arc<dyn AuditLogger>,
    cancellation_token: Option<CancellationToken>,
}

impl ExecutePlanUseCase {
    pub fn new(
        registry: Arc<dyn ToolRegistryPort>,
        invoker: Arc<dyn ToolInvokerPort>,
        escrow: Arc<dyn CredentialEscrow>,
        limiter: Arc<TenantLimiter>,
        params: EngineParams,
    ) -> Self {
        Self {
            registry,
            invoker,
            escrow,
            limiter,
            params,
            audit: Arc::new(NoAuditLogger),
            cancellation_token: None,
        }
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub async fn execute(&self, validated: &ValidatedPlan, context: Arc<ExecutionContext>) -> ExecutionReport {
        self.execute_with_progress(validated, context, &NoExecutionProgress)
            .await
    }

    pub async fn execute_with_progress(
        &self,
        validated: &ValidatedPlan,
        context: Arc<ExecutionContext>,
        progress: &dyn ExecutionProgressNotifier,
    ) -> ExecutionReport {
        let plan = validated.plan();
        let started = Instant::now();
        let max_ms = plan.security.max_execution_time_ms;

        let env = RunEnv {
            plan,
            catalog: self.registry.snapshot(),
            context,
            token: self
                .cancellation_token
                .as_ref()
                .map(CancellationToken::child_token)
                .unwrap_or_default(),
            progress,
        };

        info!(
            plan_id = %plan.id,
            steps = plan.steps.len(),
            max_execution_time_ms = max_ms,
            "Executing plan"
        );

        let deadline = tokio::time::sleep(Duration::from_millis(max_ms));
        tokio::pin!(deadline);

        let mut state = RunState::new(plan);
        let mut running: FuturesUnordered<BoxFuture<'_, StepRun>> = FuturesUnordered::new();
        let mut end = RunEnd::Finished;

        loop {
            self.schedule(&env, &mut state, &mut running);
            if state.fatal().is_some() || running.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = shared::cancelled(&self.cancellation_token) => {
                    end = RunEnd::Cancelled;
                    break;
                }
                _ = &mut deadline => {
                    end = RunEnd::DeadlineExceeded;
                    break;
                }
                Some(run) = running.next() => {
                    self.record(&env, &mut state, run, &Interruption::None);
                }
            }
        }

        let interruption = match (end, state.fatal()) {
            (RunEnd::Cancelled, _) => Interruption::Caller,
            (RunEnd::DeadlineExceeded, _) => Interruption::Deadline(max_ms),
            (RunEnd::Finished, Some(step)) => Interruption::Halted(step.clone()),
            (RunEnd::Finished, None) => Interruption::None,
        };

        env.token.cancel();
        if !running.is_empty() {
            warn!(plan_id = %plan.id, in_flight = running.len(), reason = %interruption.reason(), "Interrupting running steps");
        }
        while let Some(run) = running.next().await {
            self.record(&env, &mut state, run, &interruption);
        }
        drop(running);

        for idx in state.cancel_pending(&interruption.reason()) {
            self.step_finished(&env, state.outcome(idx));
        }

        let steps = state.into_outcomes();
        let status = PlanStatus::conclude(plan, &steps, end);
        let report = ExecutionReport {
            plan_id: plan.id.clone(),
            status,
            end,
            steps,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            plan_id = %plan.id,
            status = %report.status,
            succeeded = report.count(StepStatus::Succeeded),
            failed = report.count(StepStatus::Failed),
            duration_ms = report.duration_ms,
            "Plan finished"
        );
        self.audit.log(AuditEvent::plan(
            AuditKind::PlanFinished,
            &report.plan_id,
            &env.context.tenant,
            json!({
                "status": report.status,
                "end": report.end,
                "duration_ms": report.duration_ms,
            }),
        ));
        progress.on_plan_complete(&report);
        report
    }

    /// Start or settle every pending step that can move.
    ///
    /// Repeats until a pass changes nothing, since skipping or blocking a
    /// step can unblock or block steps listed before it.
    fn schedule<'a>(
        &'a self,
        env: &RunEnv<'a>,
        state: &mut RunState<'a>,
        running: &mut FuturesUnordered<BoxFuture<'a, StepRun>>,
    ) {
        let plan = env.plan;
        loop {
            let mut changed = false;

            for (idx, step) in plan.steps.iter().enumerate() {
                if state.fatal().is_some() {
                    return;
                }
                if state.status(idx) != StepStatus::Pending {
                    continue;
                }

                match state.gate(idx) {
                    Gate::Waiting => continue,
                    Gate::Blocked(dependency) => {
                        let outcome = state.fail(
                            idx,
                            StepStatus::Blocked,
                            StepFailure::DependencyFailed { dependency },
                            0,
                            0,
                        );
                        self.step_finished(env, outcome);
                        changed = true;
                        continue;
                    }
                    Gate::Ready => {}
                }

                let scope = state.scope_for(idx);
                if let Some(expression) = &step.condition {
                    match Condition::parse(expression).and_then(|c| c.evaluate(&scope)) {
                        Ok(true) => {}
                        Ok(false) => {
                            debug!(step = %step.id, condition = %expression, "Condition false, skipping");
                            let outcome = state.skip(idx);
                            self.step_finished(env, outcome);
                            changed = true;
                            continue;
                        }
                        Err(e) => {
                            let failure = StepFailure::BindingResolution {
                                message: format!("condition: {}", e),
                            };
                            let outcome = state.fail(idx, StepStatus::Failed, failure, 0, 0);
                            self.step_finished(env, outcome);
                            changed = true;
                            continue;
                        }
                    }
                }

                if running.len() >= self.params.effective_parallelism() {
                    continue;
                }

                let input = match resolve_inputs(&step.inputs, &scope) {
                    Ok(input) => input,
                    Err(e) => {
                        let failure = StepFailure::BindingResolution {
                            message: e.to_string(),
                        };
                        let outcome = state.fail(idx, StepStatus::Failed, failure, 0, 0);
                        self.step_finished(env, outcome);
                        changed = true;
                        continue;
                    }
                };

                let Some(tool) = step
                    .tool_key()
                    .and_then(|key| env.catalog.get(&key))
                    .cloned()
                else {
                    let failure = StepFailure::ToolFailed {
                        error: ToolError::not_found(step.tool.clone()),
                    };
                    let outcome = state.fail(idx, StepStatus::Failed, failure, 0, 0);
                    self.step_finished(env, outcome);
                    changed = true;
                    continue;
                };

                state.mark_running(idx);
                let task = StepTask {
                    idx,
                    tool,
                    input,
                    plan_id: plan.id.clone(),
                    context: env.context.clone(),
                    token: env.token.clone(),
                };
                running.push(self.run_step(step, task, env.progress).boxed());
            }

            if !changed {
                break;
            }
        }
    }

    /// Run all attempts of one step.
    async fn run_step<'a>(
        &'a self,
        step: &'a Step,
        task: StepTask,
        progress: &'a dyn ExecutionProgressNotifier,
    ) -> StepRun {
        let started = Instant::now();
        let max_attempts = step.retry.max_attempts();
        let mut attempt = 0;

        self.audit.log(AuditEvent::step(
            AuditKind::StepStarted,
            &task.plan_id,
            &task.context.tenant,
            &step.id,
            json!({ "tool": task.tool.key().to_string() }),
        ));

        let result = loop {
            attempt += 1;
            progress.on_step_start(step, attempt);
            debug!(step = %step.id, tool = %task.tool.key(), attempt, "Invoking tool");

            match self.attempt(step, &task, attempt).await {
                Ok(output) => break Ok(output),
                Err(AttemptError::Interrupted) => break Err(AttemptError::Interrupted),
                Err(AttemptError::Failed(failure)) => {
                    if !failure.is_retryable() || attempt >= max_attempts {
                        let failure = if failure.is_retryable() && attempt > 1 {
                            StepFailure::ExhaustedRetries {
                                attempts: attempt,
                                last: Box::new(failure),
                            }
                        } else {
                            failure
                        };
                        break Err(AttemptError::Failed(failure));
                    }

                    let delay = step.retry.backoff(attempt);
                    warn!(
                        step = %step.id,
                        attempt,
                        error = %failure,
                        delay_ms = delay.as_millis() as u64,
                        "Step attempt failed, retrying"
                    );
                    progress.on_step_retry(step, attempt + 1, &failure, delay);

                    tokio::select! {
                        biased;
                        _ = task.token.cancelled() => break Err(AttemptError::Interrupted),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        StepRun {
            idx: task.idx,
            attempts: attempt,
            result,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// One invocation with its tenant slot and scoped credential.
    async fn attempt(&self, step: &Step, task: &StepTask, attempt: u32) -> Result<Value, AttemptError> {
        let token = &task.token;

        let _permit = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AttemptError::Interrupted),
            permit = self.limiter.acquire(&task.context.tenant) => permit.map_err(|_| {
                AttemptError::Failed(StepFailure::Cancelled {
                    reason: "tenant limiter closed".to_string(),
                })
            })?,
        };

        let request = CredentialRequest {
            tool: task.tool.key(),
            scope: task.tool.scopes.clone(),
            ttl: self.params.credential_ttl,
            subject: task.context.subject.clone(),
            tenant: task.context.tenant.clone(),
        };
        let grant = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AttemptError::Interrupted),
            grant = self.escrow.acquire(&request) => grant.map_err(|e| {
                AttemptError::Failed(StepFailure::CredentialDenied {
                    message: e.to_string(),
                })
            })?,
        };
        let grant = ScopedGrant::new(self.escrow.clone(), grant);

        let invocation = ToolInvocation {
            plan_id: task.plan_id.clone(),
            step_id: step.id.clone(),
            tool: request.tool,
            endpoint: task.tool.endpoint.clone(),
            input: task.input.clone(),
            credential: grant.token().to_string(),
            attempt,
        };

        let invoked = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(AttemptError::Interrupted),
            result = tokio::time::timeout(step.timeout(), self.invoker.invoke(&invocation)) => match result {
                Err(_) => Err(AttemptError::Failed(StepFailure::Timeout {
                    timeout_ms: step.timeout_ms,
                })),
                Ok(Err(error)) => Err(AttemptError::Failed(StepFailure::ToolFailed { error })),
                Ok(Ok(output)) => check_output(&task.tool, output),
            },
        };
        grant.release().await;

        if !matches!(outcome, Err(AttemptError::Interrupted)) {
            self.registry.record_invocation(
                &invocation.tool,
                invoked.elapsed().as_millis() as u64,
                outcome.is_ok(),
            );
        }
        outcome
    }

    fn record(&self, env: &RunEnv<'_>, state: &mut RunState<'_>, run: StepRun, interruption: &Interruption) {
        let outcome = match run.result {
            Ok(output) => state.succeed(run.idx, run.attempts, output, run.duration_ms),
            Err(AttemptError::Failed(failure)) => {
                state.fail(run.idx, StepStatus::Failed, failure, run.attempts, run.duration_ms)
            }
            Err(AttemptError::Interrupted) => {
                let (status, failure) = interruption.running_outcome();
                state.fail(run.idx, status, failure, run.attempts, run.duration_ms)
            }
        };
        self.step_finished(env, outcome);
    }

    fn step_finished(&self, env: &RunEnv<'_>, outcome: &StepOutcome) {
        match &outcome.failure {
            None => debug!(step = %outcome.step_id, status = %outcome.status, "Step finished"),
            Some(failure) => warn!(
                step = %outcome.step_id,
                status = %outcome.status,
                error = %failure,
                "Step did not succeed"
            ),
        }

        let mut detail = json!({
            "tool": outcome.tool,
            "tool_version": outcome.tool_version,
            "status": outcome.status,
            "attempts": outcome.attempts,
            "duration_ms": outcome.duration_ms,
            "failure": outcome.failure,
        });
        if env.context.limits.retention.allows_output_persistence()
            && let Some(output) = &outcome.output
        {
            detail["output"] = output.clone();
        }
        self.audit.log(AuditEvent::step(
            AuditKind::StepFinished,
            &env.plan.id,
            &env.context.tenant,
            &outcome.step_id,
            detail,
        ));
        env.progress.on_step_complete(outcome);
    }
}

fn check_output(tool: &Tool, output: Value) -> Result<Value, AttemptError> {
    let mismatches = tool.output_schema.check_value(&output);
    if mismatches.is_empty() {
        return Ok(output);
    }
    let message = mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(AttemptError::Failed(StepFailure::OutputSchemaMismatch {
        message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{
        CatalogRegistry, CountingEscrow, RecordingAudit, ScriptedInvoker, StepScript, context, tool,
    };
    use crate::use_cases::validate_plan::{ValidatePlanUseCase, ValidationOutcome};
    use conductor_domain::{
        FailurePolicy, FieldSpec, FieldType, PlanTier, PlanValidator, RetryPolicy, Schema,
        SecurityConstraints, TimeoutPolicy, ToolVersion,
    };

    const V1: ToolVersion = ToolVersion {
        major: 1,
        minor: 0,
        patch: 0,
    };

    struct Harness {
        registry: Arc<CatalogRegistry>,
        invoker: Arc<ScriptedInvoker>,
        escrow: Arc<CountingEscrow>,
        audit: Arc<RecordingAudit>,
        params: EngineParams,
        token: Option<CancellationToken>,
    }

    impl Harness {
        fn new(invoker: ScriptedInvoker) -> Self {
            Self {
                registry: Arc::new(CatalogRegistry::new(vec![
                    tool("CustomerProfileTool", "crm"),
                    tool("LeadScoringTool", "crm"),
                    tool("OrgChartTool", "crm"),
                ])),
                invoker: Arc::new(invoker),
                escrow: Arc::new(CountingEscrow::default()),
                audit: Arc::new(RecordingAudit::default()),
                params: EngineParams::default(),
                token: None,
            }
        }

        fn with_escrow(mut self, escrow: CountingEscrow) -> Self {
            self.escrow = Arc::new(escrow);
            self
        }

        fn validated(&self, plan: Plan) -> ValidatedPlan {
            let validator = ValidatePlanUseCase::new(self.registry.clone(), PlanValidator::new().allow_unsealed());
            match validator.execute(plan, &context(&["crm"])) {
                ValidationOutcome::Accepted(validated) => validated,
                ValidationOutcome::Rejected { report, .. } => panic!("rejected: {:?}", report.violations),
            }
        }

        fn use_case(&self) -> ExecutePlanUseCase {
            let use_case = ExecutePlanUseCase::new(
                self.registry.clone(),
                self.invoker.clone(),
                self.escrow.clone(),
                Arc::new(TenantLimiter::new(8)),
                self.params.clone(),
            )
            .with_audit_logger(self.audit.clone());
            match &self.token {
                Some(token) => use_case.with_cancellation(token.clone()),
                None => use_case,
            }
        }

        async fn run(&self, plan: Plan) -> ExecutionReport {
            let validated = self.validated(plan);
            self.use_case().execute(&validated, context(&["crm"])).await
        }
    }

    fn step(id: &str, tool: &str) -> Step {
        Step::new(id, tool).with_version(V1)
    }

    fn plan() -> Plan {
        Plan::new("g", PlanTier::Low).with_confidence(0.9)
    }

    fn status_of(report: &ExecutionReport, id: &str) -> StepStatus {
        report.outcome(&StepId::new(id)).unwrap().status
    }

    fn failure_of<'r>(report: &'r ExecutionReport, id: &str) -> &'r StepFailure {
        report.outcome(&StepId::new(id)).unwrap().failure.as_ref().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_steps_overlap_and_dependents_wait() {
        let invoker = ScriptedInvoker::default()
            .with(
                "s1",
                StepScript::ok(json!({"account_id": "a-7"})).after(Duration::from_millis(100)),
            )
            .with("s3", StepScript::ok(json!({"level": 2})).after(Duration::from_millis(50)));
        let harness = Harness::new(invoker);

        let report = harness
            .run(
                plan()
                    .with_step(step("s1", "CustomerProfileTool").with_output_binding("profile"))
                    .with_step(
                        step("s2", "LeadScoringTool")
                            .with_dependency("s1")
                            .with_input("account", "${profile.account_id}"),
                    )
                    .with_step(step("s3", "OrgChartTool")),
            )
            .await;

        assert_eq!(report.status, PlanStatus::Completed);
        let inv = &harness.invoker;
        assert!(inv.position("start:s3").unwrap() < inv.position("end:s1").unwrap());
        assert!(inv.position("start:s2").unwrap() > inv.position("end:s1").unwrap());

        assert_eq!(harness.escrow.acquired(), 3);
        assert_eq!(harness.escrow.outstanding(), 0);
        let credentials = inv.credentials.lock().unwrap().clone();
        assert_eq!(credentials.len(), 3);
        assert!(credentials.iter().all(|c| c.starts_with("token-")));

        let types = harness.audit.types();
        assert_eq!(types.iter().filter(|t| **t == "step_finished").count(), 3);
        assert_eq!(types.last(), Some(&"plan_finished"));
        assert_eq!(harness.registry.recorded.lock().unwrap().len(), 3);

        let events = harness.audit.events.lock().unwrap();
        assert!(events.iter().all(|e| e.tenant == "acme" && e.plan_id == report.plan_id));
        let finished: Vec<&str> = events
            .iter()
            .filter(|e| e.kind == AuditKind::StepFinished)
            .filter_map(|e| e.step_id.as_ref().map(StepId::as_str))
            .collect();
        assert_eq!(finished.len(), 3);
        assert!(finished.contains(&"s2"));
        assert_eq!(events.last().map(|e| e.step_id.is_none()), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallelism_bound() {
        let invoker = ScriptedInvoker::default()
            .with("s1", StepScript::ok(json!({})).after(Duration::from_millis(100)))
            .with("s2", StepScript::ok(json!({})).after(Duration::from_millis(100)));
        let mut harness = Harness::new(invoker);
        harness.params = EngineParams::default().with_max_parallel_steps(1);

        let report = harness
            .run(
                plan()
                    .with_step(step("s1", "CustomerProfileTool"))
                    .with_step(step("s2", "OrgChartTool")),
            )
            .await;

        assert_eq!(report.status, PlanStatus::Completed);
        let inv = &harness.invoker;
        assert!(inv.position("start:s2").unwrap() > inv.position("end:s1").unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let invoker = ScriptedInvoker::default().with("s1", StepScript::ok(json!({})).failing(10));
        let harness = Harness::new(invoker);

        let report = harness
            .run(plan().with_step(
                step("s1", "CustomerProfileTool")
                    .with_retry(RetryPolicy::default().with_max_retries(2).with_backoff(100, 2.0, 1000)),
            ))
            .await;

        assert_eq!(report.status, PlanStatus::Failed);
        assert_eq!(harness.invoker.attempts("s1"), 3);
        let outcome = report.outcome(&StepId::new("s1")).unwrap();
        assert_eq!(outcome.attempts, 3);
        assert!(matches!(
            outcome.failure,
            Some(StepFailure::ExhaustedRetries { attempts: 3, .. })
        ));
        assert!(matches!(
            outcome.failure.as_ref().unwrap().root(),
            StepFailure::ToolFailed { .. }
        ));
        assert_eq!(harness.escrow.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let invoker = ScriptedInvoker::default().with("s1", StepScript::ok(json!({"ok": true})).failing(1));
        let harness = Harness::new(invoker);

        let report = harness
            .run(plan().with_step(
                step("s1", "CustomerProfileTool").with_retry(RetryPolicy::default().with_max_retries(2)),
            ))
            .await;

        assert_eq!(report.status, PlanStatus::Completed);
        assert_eq!(report.outcome(&StepId::new("s1")).unwrap().attempts, 2);
        assert_eq!(report.bound_outputs()["s1"], json!({"ok": true}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_with_partial_results() {
        let invoker = ScriptedInvoker::default()
            .with("s1", StepScript::ok(json!({})).after(Duration::from_secs(60)))
            .with("s2", StepScript::ok(json!({"done": true})).after(Duration::from_millis(10)));
        let harness = Harness::new(invoker);

        let report = harness
            .run(
                plan()
                    .with_security(SecurityConstraints {
                        max_execution_time_ms: 5000,
                        allowed_domains: vec![],
                        on_timeout: TimeoutPolicy::PartialResults,
                    })
                    .with_failure_policy(FailurePolicy::GracefulDegradation)
                    .with_step(step("s1", "CustomerProfileTool").with_timeout_ms(5000))
                    .with_step(step("s2", "OrgChartTool").with_timeout_ms(1000)),
            )
            .await;

        assert_eq!(report.status, PlanStatus::PartiallyCompleted);
        assert_eq!(status_of(&report, "s1"), StepStatus::Failed);
        assert!(matches!(
            failure_of(&report, "s1"),
            StepFailure::Timeout { timeout_ms: 5000 }
        ));
        assert_eq!(status_of(&report, "s2"), StepStatus::Succeeded);
        assert_eq!(report.bound_outputs()["s2"], json!({"done": true}));
        assert_eq!(harness.escrow.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_retries_and_cancels_pending() {
        let invoker = ScriptedInvoker::default()
            .with("s1", StepScript::ok(json!({})).after(Duration::from_secs(60)));
        let harness = Harness::new(invoker);

        let report = harness
            .run(
                plan()
                    .with_security(SecurityConstraints {
                        max_execution_time_ms: 5000,
                        ..SecurityConstraints::default()
                    })
                    .with_step(
                        step("s1", "CustomerProfileTool")
                            .with_timeout_ms(2000)
                            .with_retry(RetryPolicy::default().with_max_retries(5).with_backoff(100, 1.0, 100)),
                    )
                    .with_step(step("s2", "OrgChartTool").with_dependency("s1").with_timeout_ms(1000)),
            )
            .await;

        assert_eq!(report.end, RunEnd::DeadlineExceeded);
        assert_eq!(report.status, PlanStatus::Failed);
        assert_eq!(report.outcome(&StepId::new("s1")).unwrap().attempts, 3);
        assert!(matches!(
            failure_of(&report, "s1"),
            StepFailure::Timeout { timeout_ms: 5000 }
        ));
        assert_eq!(status_of(&report, "s2"), StepStatus::Cancelled);
        assert_eq!(report.duration_ms, 5000);
        assert_eq!(harness.escrow.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancellation() {
        let invoker = ScriptedInvoker::default()
            .with("s1", StepScript::ok(json!({})))
            .with("s2", StepScript::ok(json!({})).after(Duration::from_secs(20)));
        let token = CancellationToken::new();
        let mut harness = Harness::new(invoker);
        harness.token = Some(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let report = harness
            .run(
                plan()
                    .with_step(step("s1", "CustomerProfileTool"))
                    .with_step(step("s2", "OrgChartTool").with_dependency("s1"))
                    .with_step(step("s3", "LeadScoringTool").with_dependency("s2")),
            )
            .await;
        canceller.await.unwrap();

        assert_eq!(report.end, RunEnd::Cancelled);
        assert_eq!(report.status, PlanStatus::Failed);
        assert_eq!(status_of(&report, "s1"), StepStatus::Succeeded);
        assert_eq!(status_of(&report, "s2"), StepStatus::Cancelled);
        assert_eq!(status_of(&report, "s3"), StepStatus::Cancelled);
        assert_eq!(harness.escrow.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_degradation_blocks_only_dependents() {
        let invoker = ScriptedInvoker::default()
            .with("s1", StepScript::ok(json!({})).failing(1))
            .with("s3", StepScript::ok(json!({"n": 1})).after(Duration::from_millis(10)));
        let harness = Harness::new(invoker);

        let report = harness
            .run(
                plan()
                    .with_failure_policy(FailurePolicy::GracefulDegradation)
                    .with_step(step("s1", "CustomerProfileTool"))
                    .with_step(step("s2", "LeadScoringTool").with_dependency("s1"))
                    .with_step(step("s3", "OrgChartTool")),
            )
            .await;

        assert_eq!(report.status, PlanStatus::PartiallyCompleted);
        assert_eq!(status_of(&report, "s1"), StepStatus::Failed);
        assert_eq!(status_of(&report, "s2"), StepStatus::Blocked);
        assert!(matches!(
            failure_of(&report, "s2"),
            StepFailure::DependencyFailed { dependency } if dependency.as_str() == "s1"
        ));
        assert_eq!(status_of(&report, "s3"), StepStatus::Succeeded);
        assert_eq!(harness.invoker.attempts("s2"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_failure_is_fatal_under_graceful_policy() {
        let invoker = ScriptedInvoker::default()
            .with("s1", StepScript::ok(json!({})).failing(1))
            .with("s2", StepScript::ok(json!({})).after(Duration::from_secs(3)));
        let harness = Harness::new(invoker);

        let report = harness
            .run(
                plan()
                    .with_failure_policy(FailurePolicy::GracefulDegradation)
                    .with_step(step("s1", "CustomerProfileTool").critical())
                    .with_step(step("s2", "OrgChartTool")),
            )
            .await;

        assert_eq!(report.status, PlanStatus::Failed);
        assert_eq!(status_of(&report, "s2"), StepStatus::Cancelled);
        assert!(matches!(
            failure_of(&report, "s2"),
            StepFailure::Cancelled { reason } if reason.contains("'s1'")
        ));
        assert_eq!(harness.escrow.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_false_condition_skips_and_skipped_satisfies_dependents() {
        let invoker = ScriptedInvoker::default().with("s1", StepScript::ok(json!({"score": 10})));
        let harness = Harness::new(invoker);

        let report = harness
            .run(
                plan()
                    .with_step(step("s1", "LeadScoringTool"))
                    .with_step(
                        step("s2", "CustomerProfileTool")
                            .with_dependency("s1")
                            .with_condition("${s1.score} > 50"),
                    )
                    .with_step(step("s3", "OrgChartTool").with_dependency("s2")),
            )
            .await;

        assert_eq!(report.status, PlanStatus::Completed);
        assert_eq!(status_of(&report, "s2"), StepStatus::Skipped);
        assert_eq!(status_of(&report, "s3"), StepStatus::Succeeded);
        assert_eq!(harness.invoker.attempts("s2"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_binding_failure_is_not_retried() {
        let invoker = ScriptedInvoker::default().with("s1", StepScript::ok(json!({"id": 1})));
        let harness = Harness::new(invoker);

        let report = harness
            .run(
                plan()
                    .with_step(step("s1", "CustomerProfileTool"))
                    .with_step(
                        step("s2", "OrgChartTool")
                            .with_dependency("s1")
                            .with_input("manager", "${s1.manager.id}")
                            .with_retry(RetryPolicy::default().with_max_retries(3)),
                    ),
            )
            .await;

        assert_eq!(report.status, PlanStatus::Failed);
        assert!(matches!(
            failure_of(&report, "s2"),
            StepFailure::BindingResolution { .. }
        ));
        assert_eq!(report.outcome(&StepId::new("s2")).unwrap().attempts, 0);
        assert_eq!(harness.invoker.attempts("s2"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_schema_is_enforced() {
        let harness = Harness::new(ScriptedInvoker::default().with("s1", StepScript::ok(json!({"name": 3}))));
        harness
            .registry
            .register(
                Tool::new("TypedTool", V1, conductor_domain::Embedding::new(vec![1.0, 0.0]))
                    .with_scope("crm")
                    .with_output_schema(
                        Schema::new().with_field("name", FieldSpec::required(FieldType::String)),
                    ),
            )
            .unwrap();

        let report = harness.run(plan().with_step(step("s1", "TypedTool"))).await;

        assert!(matches!(
            failure_of(&report, "s1"),
            StepFailure::OutputSchemaMismatch { message } if message.contains("name")
        ));
        assert_eq!(
            harness.registry.recorded.lock().unwrap()[0],
            (conductor_domain::ToolKey::new("TypedTool", V1), false)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_credential_never_invokes() {
        let harness = Harness::new(ScriptedInvoker::default())
            .with_escrow(CountingEscrow::denying("CustomerProfileTool"));

        let report = harness
            .run(plan().with_step(step("s1", "CustomerProfileTool")))
            .await;

        assert_eq!(report.status, PlanStatus::Failed);
        assert!(matches!(
            failure_of(&report, "s1"),
            StepFailure::CredentialDenied { .. }
        ));
        assert_eq!(harness.invoker.attempts("s1"), 0);
    }
}
