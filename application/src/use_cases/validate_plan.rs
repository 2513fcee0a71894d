//! Validate plan use case
//!
//! Validates a plan against the current catalog snapshot and the caller's
//! context. Only an accepted plan becomes a [`ValidatedPlan`], the sole
//! input the execution engine takes, so a rejected plan cannot run.

use crate::ports::audit_logger::{AuditEvent, AuditKind, AuditLogger, NoAuditLogger};
use crate::ports::tool_registry::ToolRegistryPort;
use conductor_domain::{ExecutionContext, Plan, PlanValidator, ValidationReport};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// A plan that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    plan: Plan,
    report: ValidationReport,
}

impl ValidatedPlan {
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn into_plan(self) -> Plan {
        self.plan
    }
}

#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    Accepted(ValidatedPlan),
    Rejected { plan: Plan, report: ValidationReport },
}

impl ValidationOutcome {
    pub fn report(&self) -> &ValidationReport {
        match self {
            ValidationOutcome::Accepted(validated) => validated.report(),
            ValidationOutcome::Rejected { report, .. } => report,
        }
    }
}

pub struct ValidatePlanUseCase {
    registry: Arc<dyn ToolRegistryPort>,
    validator: PlanValidator,
    audit: Arc<dyn AuditLogger>,
}

impl ValidatePlanUseCase {
    pub fn new(registry: Arc<dyn ToolRegistryPort>, validator: PlanValidator) -> Self {
        Self {
            registry,
            validator,
            audit: Arc::new(NoAuditLogger),
        }
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// Validate without taking ownership; never logs an audit event.
    pub fn check(&self, plan: &Plan, context: &ExecutionContext) -> ValidationReport {
        self.validator.validate(plan, &self.registry.snapshot(), context)
    }

    pub fn execute(&self, plan: Plan, context: &ExecutionContext) -> ValidationOutcome {
        let report = self.check(&plan, context);

        if report.is_valid() {
            info!(plan_id = %plan.id, "Plan validated");
            self.audit.log(AuditEvent::plan(
                AuditKind::PlanValidated,
                &plan.id,
                &context.tenant,
                json!({ "steps": plan.steps.len() }),
            ));
            return ValidationOutcome::Accepted(ValidatedPlan { plan, report });
        }

        warn!(
            plan_id = %plan.id,
            verdict = %report.verdict,
            violations = report.violations.len(),
            "Plan rejected"
        );
        self.audit.log(AuditEvent::plan(
            AuditKind::PlanRejected,
            &plan.id,
            &context.tenant,
            json!({
                "verdict": report.verdict,
                "violations": report.violations,
            }),
        ));
        ValidationOutcome::Rejected { plan, report }
    }
}
