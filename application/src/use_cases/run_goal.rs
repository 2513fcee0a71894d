//! Run goal use case
//!
//! The end-to-end request path:
//!
//! ```text
//! goal ─▶ DiscoverTools ─▶ GeneratePlan(low) ─▶ Escalate (≤ 1 high call)
//!                                                   │
//!        RunGoalOutput ◀─ ExecutePlan ◀─ ValidatePlan
//! ```
//!
//! Planning failures are errors. Once a plan exists, every outcome
//! (rejected, failed, partial, completed) is reported as a [`RunGoalOutput`].

use super::discover_tools::{DiscoverToolsError, DiscoverToolsUseCase};
use super::escalate::{EscalateUseCase, EscalationDecision, EscalationError, PlanningSession};
use super::execute_plan::{ExecutePlanUseCase, TenantLimiter};
use super::generate_plan::{GeneratePlanUseCase, PlanGenerationError};
use super::shared;
use super::validate_plan::{ValidatePlanUseCase, ValidationOutcome};
use crate::config::EngineParams;
use crate::ports::audit_logger::{AuditEvent, AuditKind, AuditLogger, NoAuditLogger};
use crate::ports::credential_escrow::CredentialEscrow;
use crate::ports::embedding::EmbeddingPort;
use crate::ports::execution_progress::{ExecutionProgressNotifier, NoExecutionProgress};
use crate::ports::plan_oracle::{PlanRequest, TieredOracles};
use crate::ports::tool_invoker::ToolInvokerPort;
use crate::ports::tool_registry::ToolRegistryPort;
use conductor_domain::{
    DomainError, EscalationAssessment, ExecutionContext, ExecutionReport, Goal, Plan, PlanId,
    PlanStatus, PlanTier, PlanValidator, RunEnd, StepOutcome, StepStatus, Tool, ValidationReport,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Error, Debug)]
pub enum RunGoalError {
    #[error("Invalid goal: {0}")]
    InvalidGoal(#[from] DomainError),

    #[error("Tool discovery failed: {0}")]
    Discovery(#[from] DiscoverToolsError),

    #[error("No authorized tool matches the goal")]
    NoCandidates,

    #[error("Plan generation failed: {0}")]
    Generation(#[from] PlanGenerationError),

    #[error(transparent)]
    Escalation(#[from] EscalationError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl RunGoalError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            RunGoalError::Cancelled => true,
            RunGoalError::Generation(e) => e.is_cancelled(),
            RunGoalError::Escalation(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

/// Input for the RunGoal use case
#[derive(Debug, Clone)]
pub struct RunGoalInput {
    pub goal: String,
    pub context: Arc<ExecutionContext>,
}

impl RunGoalInput {
    pub fn new(goal: impl Into<String>, context: Arc<ExecutionContext>) -> Self {
        Self {
            goal: goal.into(),
            context,
        }
    }
}

/// Result of one goal.
#[derive(Debug, Clone, Serialize)]
pub struct RunGoalOutput {
    pub plan_id: PlanId,
    /// One of Completed, PartiallyCompleted, Failed or Rejected
    pub status: PlanStatus,
    pub step_results: Vec<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub plan: Plan,
    pub escalation: EscalationDecision,
    pub assessment: EscalationAssessment,
    pub validation: ValidationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<RunEnd>,
}

impl RunGoalOutput {
    fn rejected(plan: Plan, report: ValidationReport, escalation: EscalationDecision, assessment: EscalationAssessment) -> Self {
        let summary = report
            .violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            plan_id: plan.id.clone(),
            status: PlanStatus::Rejected,
            step_results: Vec::new(),
            error: Some(format!("plan {}: {}", report.verdict, summary)),
            plan,
            escalation,
            assessment,
            validation: report,
            end: None,
        }
    }

    fn executed(
        plan: Plan,
        report: ExecutionReport,
        validation: ValidationReport,
        escalation: EscalationDecision,
        assessment: EscalationAssessment,
    ) -> Self {
        Self {
            plan_id: report.plan_id.clone(),
            status: report.status,
            error: execution_error(&report),
            step_results: report.steps,
            plan,
            escalation,
            assessment,
            validation,
            end: Some(report.end),
        }
    }
}

/// A one-line explanation for a failed plan.
fn execution_error(report: &ExecutionReport) -> Option<String> {
    if report.status != PlanStatus::Failed {
        return None;
    }
    if report.end == RunEnd::Cancelled {
        return Some("execution cancelled by caller".to_string());
    }
    if report.end == RunEnd::DeadlineExceeded {
        return Some("execution deadline exceeded".to_string());
    }
    report
        .steps
        .iter()
        .find(|o| o.status == StepStatus::Failed)
        .and_then(|o| {
            o.failure
                .as_ref()
                .map(|f| format!("step '{}' failed: {}", o.step_id, f))
        })
}

/// External collaborators of the engine.
#[derive(Clone)]
pub struct EnginePorts {
    pub registry: Arc<dyn ToolRegistryPort>,
    pub embedder: Arc<dyn EmbeddingPort>,
    pub oracles: TieredOracles,
    pub invoker: Arc<dyn ToolInvokerPort>,
    pub escrow: Arc<dyn CredentialEscrow>,
    pub limiter: Arc<TenantLimiter>,
}

/// Use case for running one goal end to end.
pub struct RunGoalUseCase {
    ports: EnginePorts,
    params: EngineParams,
    audit: Arc<dyn AuditLogger>,
    cancellation_token: Option<CancellationToken>,
}

impl RunGoalUseCase {
    pub fn new(ports: EnginePorts, params: EngineParams) -> Self {
        Self {
            ports,
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

    pub async fn execute(&self, input: RunGoalInput) -> Result<RunGoalOutput, RunGoalError> {
        self.execute_with_progress(input, &NoExecutionProgress)
            .await
    }

    pub async fn execute_with_progress(
        &self,
        input: RunGoalInput,
        progress: &dyn ExecutionProgressNotifier,
    ) -> Result<RunGoalOutput, RunGoalError> {
        if shared::is_cancelled(&self.cancellation_token) {
            return Err(RunGoalError::Cancelled);
        }

        let goal = Goal::parse(&input.goal)?;
        let context = input.context;
        info!(subject = %context.subject, tenant = %context.tenant, goal = %goal, "Running goal");

        // ==================== Discovery ====================

        let matches = DiscoverToolsUseCase::new(self.ports.embedder.clone(), self.ports.registry.clone())
            .execute(&goal, &context, self.params.top_k)
            .await?;
        progress.on_candidates(&matches);
        if matches.is_empty() {
            return Err(RunGoalError::NoCandidates);
        }
        let candidates: Vec<Tool> = matches.into_iter().map(|m| m.tool).collect();

        // ==================== Planning ====================

        let generator = Arc::new(self.generator());
        let request = PlanRequest::new(goal, candidates, context.clone(), PlanTier::Low);
        let draft = generator.generate(&request).await?;
        self.audit.log(AuditEvent::plan(
            AuditKind::PlanGenerated,
            &draft.id,
            &context.tenant,
            json!({
                "tier": draft.tier,
                "confidence": draft.confidence,
                "steps": draft.steps.len(),
                "attestation": draft.attestation,
            }),
        ));
        progress.on_plan_generated(&draft);

        let draft_id = draft.id.clone();
        let mut session = PlanningSession::new();
        let escalation = EscalateUseCase::new(generator, self.params.escalation.clone())
            .escalate(draft, &request, &mut session)
            .await?;
        let escalated = escalation.decision == EscalationDecision::Escalated;
        progress.on_escalation_assessed(&escalation.assessment, escalated);
        if escalated {
            self.audit.log(AuditEvent::plan(
                AuditKind::PlanEscalated,
                &escalation.plan.id,
                &context.tenant,
                json!({
                    "from_plan_id": draft_id,
                    "reasons": escalation.assessment.reasons,
                    "complexity": escalation.assessment.complexity,
                }),
            ));
            progress.on_plan_generated(&escalation.plan);
        }

        // ==================== Validation ====================

        let mut validator = PlanValidator::new();
        if self.params.allow_unsealed_plans {
            validator = validator.allow_unsealed();
        }
        let outcome = ValidatePlanUseCase::new(self.ports.registry.clone(), validator)
            .with_audit_logger(self.audit.clone())
            .execute(escalation.plan, &context);
        progress.on_validation(outcome.report());

        let validated = match outcome {
            ValidationOutcome::Accepted(validated) => validated,
            ValidationOutcome::Rejected { plan, report } => {
                return Ok(RunGoalOutput::rejected(
                    plan,
                    report,
                    escalation.decision,
                    escalation.assessment,
                ));
            }
        };

        // ==================== Execution ====================

        let report = self
            .executor()
            .execute_with_progress(&validated, context, progress)
            .await;
        let validation = validated.report().clone();
        Ok(RunGoalOutput::executed(
            validated.into_plan(),
            report,
            validation,
            escalation.decision,
            escalation.assessment,
        ))
    }

    fn generator(&self) -> GeneratePlanUseCase {
        let generator = GeneratePlanUseCase::new(
            self.ports.oracles.clone(),
            self.ports.registry.clone(),
            self.params.oracle_timeout,
        );
        match &self.cancellation_token {
            Some(token) => generator.with_cancellation(token.clone()),
            None => generator,
        }
    }

    fn executor(&self) -> ExecutePlanUseCase {
        let executor = ExecutePlanUseCase::new(
            self.ports.registry.clone(),
            self.ports.invoker.clone(),
            self.ports.escrow.clone(),
            self.ports.limiter.clone(),
            self.params.clone(),
        )
        .with_audit_logger(self.audit.clone());
        match &self.cancellation_token {
            Some(token) => executor.with_cancellation(token.clone()),
            None => executor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{
        CatalogRegistry, CountingEscrow, FixedEmbedder, OracleScript, RecordingAudit,
        ScriptedInvoker, ScriptedOracle, StepScript, context, tool,
    };
    use conductor_domain::{SecurityConstraints, Step, ViolationKind};

    struct Harness {
        low: Arc<ScriptedOracle>,
        high: Arc<ScriptedOracle>,
        invoker: Arc<ScriptedInvoker>,
        escrow: Arc<CountingEscrow>,
        audit: Arc<RecordingAudit>,
        use_case: RunGoalUseCase,
    }

    fn harness(low: Vec<OracleScript>, high: Vec<OracleScript>) -> Harness {
        let registry = Arc::new(CatalogRegistry::new(vec![
            tool("CustomerProfileTool", "crm"),
            tool("LeadScoringTool", "crm"),
            tool("BillingAnalyticsTool", "finance"),
        ]));
        let low = Arc::new(ScriptedOracle::new("low", low));
        let high = Arc::new(ScriptedOracle::new("high", high));
        let invoker = Arc::new(
            ScriptedInvoker::default().with("s1", StepScript::ok(json!({"account_id": "a-1"}))),
        );
        let escrow = Arc::new(CountingEscrow::default());
        let audit = Arc::new(RecordingAudit::default());

        let ports = EnginePorts {
            registry,
            embedder: Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            oracles: TieredOracles::new(low.clone(), high.clone()),
            invoker: invoker.clone(),
            escrow: escrow.clone(),
            limiter: Arc::new(TenantLimiter::new(4)),
        };
        let use_case = RunGoalUseCase::new(ports, EngineParams::default()).with_audit_logger(audit.clone());

        Harness {
            low,
            high,
            invoker,
            escrow,
            audit,
            use_case,
        }
    }

    fn draft(confidence: f64) -> Plan {
        Plan::new("", PlanTier::Low)
            .with_confidence(confidence)
            .with_step(Step::new("s1", "CustomerProfileTool").with_output_binding("profile"))
            .with_step(
                Step::new("s2", "LeadScoringTool")
                    .with_dependency("s1")
                    .with_input("account", "${profile.account_id}"),
            )
    }

    fn crm_goal() -> RunGoalInput {
        RunGoalInput::new("Score the lead for customer c-42", context(&["crm"]))
    }

    #[tokio::test]
    async fn test_confident_plan_runs_to_completion() {
        let h = harness(vec![OracleScript::Plan(draft(0.95))], vec![]);

        let output = h.use_case.execute(crm_goal()).await.unwrap();

        assert_eq!(output.status, PlanStatus::Completed);
        assert_eq!(output.escalation, EscalationDecision::NotNeeded);
        assert_eq!(output.plan.tier, PlanTier::Low);
        assert!(output.plan.is_sealed());
        assert_eq!(output.step_results.len(), 2);
        assert!(output.error.is_none());
        assert_eq!(h.high.calls(), 0);
        assert_eq!(h.escrow.outstanding(), 0);
        assert_eq!(
            h.audit.types(),
            vec![
                "plan_generated",
                "plan_validated",
                "step_started",
                "step_finished",
                "step_started",
                "step_finished",
                "plan_finished",
            ]
        );
    }

    #[tokio::test]
    async fn test_uncertain_draft_escalates_once() {
        let h = harness(
            vec![OracleScript::Plan(draft(0.4))],
            vec![OracleScript::Plan(draft(0.5))],
        );

        let output = h.use_case.execute(crm_goal()).await.unwrap();

        assert_eq!(output.escalation, EscalationDecision::Escalated);
        assert_eq!(output.plan.tier, PlanTier::High);
        assert_eq!(output.status, PlanStatus::Completed);
        assert_eq!(h.low.calls(), 1);
        assert_eq!(h.high.calls(), 1);
        assert!(h.audit.types().contains(&"plan_escalated"));
    }

    /// Seven-step chain over the two crm tools: raw 2 * 1 + 6 = 8. Short
    /// step timeouts keep the critical path inside the plan budget.
    fn long_chain(confidence: f64) -> Plan {
        (2..=7).fold(
            Plan::new("", PlanTier::Low)
                .with_confidence(confidence)
                .with_step(Step::new("s1", "CustomerProfileTool").with_timeout_ms(2_000)),
            |plan, i| {
                let tool = if i % 2 == 0 { "LeadScoringTool" } else { "CustomerProfileTool" };
                plan.with_step(
                    Step::new(format!("s{}", i), tool)
                        .with_dependency(format!("s{}", i - 1))
                        .with_timeout_ms(2_000),
                )
            },
        )
    }

    #[tokio::test]
    async fn test_complex_draft_escalates_once() {
        let h = harness(
            vec![OracleScript::Plan(long_chain(0.95))],
            vec![OracleScript::Plan(long_chain(0.95))],
        );

        let output = h.use_case.execute(crm_goal()).await.unwrap();

        assert!(output.assessment.complexity.score >= 0.8);
        assert_eq!(output.assessment.complexity.depth, 7);
        assert_eq!(output.escalation, EscalationDecision::Escalated);
        assert_eq!(output.plan.tier, PlanTier::High);
        assert_eq!(output.status, PlanStatus::Completed);
        assert_eq!(output.step_results.len(), 7);
        assert_eq!(h.low.calls(), 1);
        assert_eq!(h.high.calls(), 1);
        let types = h.audit.types();
        assert_eq!(types.iter().filter(|t| **t == "plan_escalated").count(), 1);
    }

    #[tokio::test]
    async fn test_out_of_domain_tool_never_executes() {
        let finance = Plan::new("", PlanTier::Low)
            .with_confidence(0.95)
            .with_step(Step::new("s1", "CustomerProfileTool"))
            .with_step(Step::new("s2", "BillingAnalyticsTool").with_dependency("s1"));
        let h = harness(vec![OracleScript::Plan(finance)], vec![]);

        let err = h.use_case.execute(crm_goal()).await.unwrap_err();

        assert!(matches!(
            err,
            RunGoalError::Generation(PlanGenerationError::ContractBreach { .. })
        ));
        assert!(h.invoker.events().is_empty());
        assert_eq!(h.escrow.acquired(), 0);
    }

    #[tokio::test]
    async fn test_plan_domain_restriction_rejects_without_running() {
        let restricted = draft(0.95).with_security(SecurityConstraints {
            allowed_domains: vec!["finance".to_string()],
            ..SecurityConstraints::default()
        });
        let h = harness(vec![OracleScript::Plan(restricted)], vec![]);

        let output = h.use_case.execute(crm_goal()).await.unwrap();

        assert_eq!(output.status, PlanStatus::Rejected);
        assert!(output.step_results.is_empty());
        assert!(output.error.as_deref().unwrap().contains("authorization"));
        assert!(h.invoker.events().is_empty());
        assert_eq!(h.audit.types(), vec!["plan_generated", "plan_rejected"]);
    }

    #[tokio::test]
    async fn test_cyclic_plan_is_rejected_with_zero_steps_executed() {
        let cyclic = Plan::new("", PlanTier::Low)
            .with_confidence(0.95)
            .with_step(Step::new("s1", "CustomerProfileTool").with_dependency("s2"))
            .with_step(Step::new("s2", "LeadScoringTool").with_dependency("s1"));
        let h = harness(vec![OracleScript::Plan(cyclic)], vec![]);

        let output = h.use_case.execute(crm_goal()).await.unwrap();

        assert_eq!(output.status, PlanStatus::Rejected);
        assert!(output
            .validation
            .violations
            .iter()
            .any(|v| matches!(v.kind, ViolationKind::DependencyCycle { .. })));
        assert!(h.invoker.events().is_empty());
    }

    #[tokio::test]
    async fn test_planning_errors() {
        let h = harness(vec![], vec![]);
        let blank = h
            .use_case
            .execute(RunGoalInput::new("   ", context(&["crm"])))
            .await
            .unwrap_err();
        assert!(matches!(blank, RunGoalError::InvalidGoal(_)));

        let nothing = h
            .use_case
            .execute(RunGoalInput::new("Score a lead", context(&["hr"])))
            .await
            .unwrap_err();
        assert!(matches!(nothing, RunGoalError::NoCandidates));
        assert_eq!(h.low.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let h = harness(vec![OracleScript::Plan(draft(0.95))], vec![]);
        let use_case = h.use_case.with_cancellation(token);

        let err = use_case.execute(crm_goal()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(h.low.calls(), 0);
    }
}
