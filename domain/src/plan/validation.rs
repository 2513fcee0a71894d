//! Plan validation.
//!
//! [`PlanValidator::validate`] runs every check against a plan, the catalog
//! snapshot and the caller's [`ExecutionContext`], collecting all
//! violations instead of stopping at the first one. It never mutates the
//! plan, so validating the same inputs twice yields the same report.
//!
//! | Category | Checks | Verdict |
//! |----------|--------|---------|
//! | Schema | tool exists at pinned version, not deprecated, inputs match schema, conditions parse | Rejected |
//! | Dependency | unique ids, resolvable `depends_on`, acyclic, references declared | Rejected |
//! | Authorization | context domains, tool allow-list, plan `allowed_domains` | Rejected |
//! | ResourceLimit | critical path, step count, session runtime | ResourceLimitExceeded |
//! | Integrity | attestation present and matching | IntegrityViolation |

use super::attestation::{self, AttestationCheck};
use super::binding::BindingExpr;
use super::condition::Condition;
use super::entities::{Plan, Step};
use super::graph::{self, GraphError, format_cycle};
use super::value_objects::{PlanId, StepId};
use crate::context::ExecutionContext;
use crate::tool::schema::json_type_name;
use crate::tool::{FieldType, Tool, ToolCatalog};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    Schema,
    Dependency,
    Authorization,
    ResourceLimit,
    Integrity,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &str {
        match self {
            ViolationCategory::Schema => "schema",
            ViolationCategory::Dependency => "dependency",
            ViolationCategory::Authorization => "authorization",
            ViolationCategory::ResourceLimit => "resource_limit",
            ViolationCategory::Integrity => "integrity",
        }
    }
}

impl std::fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    #[error("plan has no steps")]
    EmptyPlan,

    #[error("tool '{tool}' is not registered at the referenced version")]
    UnknownTool { tool: String },

    #[error("tool '{tool}' is deprecated")]
    DeprecatedTool { tool: String },

    #[error("tool '{tool}' is referenced without a version")]
    UnpinnedVersion { tool: String },

    #[error("required input '{field}' is missing")]
    MissingInput { field: String },

    #[error("input '{field}' is not declared by the tool")]
    UnknownInput { field: String },

    #[error("input '{field}' expects {expected}, got {found}")]
    InputTypeMismatch {
        field: String,
        expected: FieldType,
        found: String,
    },

    #[error("input '{field}' expects {expected}, but '{reference}' produces {found}")]
    ReferenceTypeMismatch {
        field: String,
        reference: String,
        expected: FieldType,
        found: FieldType,
    },

    #[error("input '{field}' has a malformed binding: {reason}")]
    MalformedBinding { field: String, reason: String },

    #[error("condition does not parse: {reason}")]
    MalformedCondition { reason: String },

    #[error("output binding '{name}' is not unique")]
    DuplicateOutputBinding { name: String },

    #[error("step id is not unique")]
    DuplicateStepId,

    #[error("depends on unknown step '{missing}'")]
    DanglingDependency { missing: StepId },

    #[error("dependency cycle: {}", format_cycle(.cycle))]
    DependencyCycle { cycle: Vec<StepId> },

    #[error("reference '{reference}' does not name a declared dependency")]
    UndeclaredReference { reference: String },

    #[error("tool '{tool}' has no scope inside the authorized domains")]
    ToolOutsideDomains { tool: String },

    #[error("tool '{tool}' is not in the authorized tool set")]
    ToolNotAuthorized { tool: String },

    #[error("tool '{tool}' has no scope inside the plan's allowed domains")]
    ToolOutsidePlanDomains { tool: String },

    #[error("critical path of {critical_path_ms}ms exceeds max_execution_time_ms {max_execution_time_ms}")]
    CriticalPathExceeded {
        critical_path_ms: u64,
        max_execution_time_ms: u64,
    },

    #[error("plan has {steps} steps, session allows {max_tools}")]
    TooManySteps { steps: usize, max_tools: usize },

    #[error("max_execution_time_ms {max_execution_time_ms} exceeds session runtime {max_runtime_ms}ms")]
    ExecutionTimeAboveSession {
        max_execution_time_ms: u64,
        max_runtime_ms: u64,
    },

    #[error("plan carries no attestation")]
    MissingAttestation,

    #[error("attestation mismatch: expected {expected}, found {found}")]
    AttestationMismatch { expected: String, found: String },
}

impl ViolationKind {
    pub fn category(&self) -> ViolationCategory {
        use ViolationKind::*;
        match self {
            EmptyPlan
            | UnknownTool { .. }
            | DeprecatedTool { .. }
            | UnpinnedVersion { .. }
            | MissingInput { .. }
            | UnknownInput { .. }
            | InputTypeMismatch { .. }
            | ReferenceTypeMismatch { .. }
            | MalformedBinding { .. }
            | MalformedCondition { .. }
            | DuplicateOutputBinding { .. } => ViolationCategory::Schema,
            DuplicateStepId
            | DanglingDependency { .. }
            | DependencyCycle { .. }
            | UndeclaredReference { .. } => ViolationCategory::Dependency,
            ToolOutsideDomains { .. } | ToolNotAuthorized { .. } | ToolOutsidePlanDomains { .. } => {
                ViolationCategory::Authorization
            }
            CriticalPathExceeded { .. } | TooManySteps { .. } | ExecutionTimeAboveSession { .. } => {
                ViolationCategory::ResourceLimit
            }
            MissingAttestation | AttestationMismatch { .. } => ViolationCategory::Integrity,
        }
    }
}

/// A single validation finding, optionally tied to a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationViolation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    pub category: ViolationCategory,
    #[serde(flatten)]
    pub kind: ViolationKind,
    pub message: String,
}

impl ValidationViolation {
    pub fn plan(kind: ViolationKind) -> Self {
        Self {
            step_id: None,
            category: kind.category(),
            message: kind.to_string(),
            kind,
        }
    }

    pub fn step(step_id: &StepId, kind: ViolationKind) -> Self {
        Self {
            step_id: Some(step_id.clone()),
            ..Self::plan(kind)
        }
    }
}

impl std::fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.step_id {
            Some(step) => write!(f, "[{}] step '{}': {}", self.category, step, self.message),
            None => write!(f, "[{}] {}", self.category, self.message),
        }
    }
}

/// Overall outcome of validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    /// Schema, dependency or authorization violations
    Rejected,
    ResourceLimitExceeded,
    IntegrityViolation,
}

impl Verdict {
    pub fn as_str(&self) -> &str {
        match self {
            Verdict::Valid => "valid",
            Verdict::Rejected => "rejected",
            Verdict::ResourceLimitExceeded => "resource_limit_exceeded",
            Verdict::IntegrityViolation => "integrity_violation",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub plan_id: PlanId,
    pub verdict: Verdict,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationReport {
    fn new(plan_id: PlanId, violations: Vec<ValidationViolation>) -> Self {
        let has = |category| violations.iter().any(|v| v.category == category);
        let verdict = if has(ViolationCategory::Integrity) {
            Verdict::IntegrityViolation
        } else if has(ViolationCategory::Schema)
            || has(ViolationCategory::Dependency)
            || has(ViolationCategory::Authorization)
        {
            Verdict::Rejected
        } else if has(ViolationCategory::ResourceLimit) {
            Verdict::ResourceLimitExceeded
        } else {
            Verdict::Valid
        };
        Self {
            plan_id,
            verdict,
            violations,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }

    pub fn in_category(&self, category: ViolationCategory) -> impl Iterator<Item = &ValidationViolation> {
        self.violations.iter().filter(move |v| v.category == category)
    }

    pub fn for_step<'a>(&'a self, step: &'a StepId) -> impl Iterator<Item = &'a ValidationViolation> {
        self.violations
            .iter()
            .filter(move |v| v.step_id.as_ref() == Some(step))
    }
}

/// Stateless plan validator.
#[derive(Debug, Clone)]
pub struct PlanValidator {
    require_attestation: bool,
}

impl Default for PlanValidator {
    fn default() -> Self {
        Self {
            require_attestation: true,
        }
    }
}

impl PlanValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept plans without an attestation (hand-written plan files).
    /// A present attestation is still verified.
    pub fn allow_unsealed(mut self) -> Self {
        self.require_attestation = false;
        self
    }

    pub fn validate(
        &self,
        plan: &Plan,
        catalog: &ToolCatalog,
        context: &ExecutionContext,
    ) -> ValidationReport {
        let mut violations = Vec::new();

        if plan.steps.is_empty() {
            violations.push(ValidationViolation::plan(ViolationKind::EmptyPlan));
        }

        check_output_bindings(plan, &mut violations);
        for step in &plan.steps {
            let tool = check_tool_reference(step, catalog, &mut violations);
            if let Some(tool) = tool {
                check_inputs(plan, step, tool, catalog, &mut violations);
                check_authorization(plan, step, tool, context, &mut violations);
            }
            check_condition(step, &mut violations);
            check_references(plan, step, &mut violations);
        }
        check_graph(plan, &mut violations);
        check_resources(plan, context, &mut violations);
        self.check_attestation(plan, catalog, &mut violations);

        ValidationReport::new(plan.id.clone(), violations)
    }

    fn check_attestation(
        &self,
        plan: &Plan,
        catalog: &ToolCatalog,
        violations: &mut Vec<ValidationViolation>,
    ) {
        match attestation::verify(plan, catalog) {
            Ok(AttestationCheck::Valid) => {}
            Ok(AttestationCheck::Missing) => {
                if self.require_attestation {
                    violations.push(ValidationViolation::plan(ViolationKind::MissingAttestation));
                }
            }
            Ok(AttestationCheck::Mismatch { expected, found }) => violations.push(
                ValidationViolation::plan(ViolationKind::AttestationMismatch { expected, found }),
            ),
            Err(e) => violations.push(ValidationViolation::plan(
                ViolationKind::AttestationMismatch {
                    expected: e.to_string(),
                    found: plan.attestation.clone().unwrap_or_default(),
                },
            )),
        }
    }
}

/// Resolve the tool record a step refers to, reporting schema violations.
/// Unpinned steps fall back to the latest version so the remaining checks
/// still run.
fn check_tool_reference<'c>(
    step: &Step,
    catalog: &'c ToolCatalog,
    violations: &mut Vec<ValidationViolation>,
) -> Option<&'c Tool> {
    let tool = match step.tool_version {
        Some(version) => catalog.get_version(&step.tool, version),
        None => {
            violations.push(ValidationViolation::step(
                &step.id,
                ViolationKind::UnpinnedVersion {
                    tool: step.tool.clone(),
                },
            ));
            catalog.latest(&step.tool)
        }
    };

    let Some(tool) = tool else {
        let shown = match step.tool_key() {
            Some(key) => key.to_string(),
            None => step.tool.clone(),
        };
        violations.push(ValidationViolation::step(
            &step.id,
            ViolationKind::UnknownTool { tool: shown },
        ));
        return None;
    };

    if tool.is_deprecated() {
        violations.push(ValidationViolation::step(
            &step.id,
            ViolationKind::DeprecatedTool {
                tool: tool.key().to_string(),
            },
        ));
    }
    Some(tool)
}

/// Declared output type of a referenced field, when the producer is known.
fn referenced_output_type(
    plan: &Plan,
    root: &str,
    field: &str,
    catalog: &ToolCatalog,
) -> Option<FieldType> {
    let producer = plan.step_answering_to(root)?;
    let tool = catalog.get(&producer.tool_key()?)?;
    tool.output_schema.field(field).map(|spec| spec.field_type)
}

fn check_inputs(
    plan: &Plan,
    step: &Step,
    tool: &Tool,
    catalog: &ToolCatalog,
    violations: &mut Vec<ValidationViolation>,
) {
    let schema = &tool.input_schema;

    for required in schema.required_fields() {
        if !step.inputs.contains_key(required) {
            violations.push(ValidationViolation::step(
                &step.id,
                ViolationKind::MissingInput {
                    field: required.to_string(),
                },
            ));
        }
    }

    for (field, value) in &step.inputs {
        let Some(spec) = schema.field(field) else {
            if !schema.additional {
                violations.push(ValidationViolation::step(
                    &step.id,
                    ViolationKind::UnknownInput {
                        field: field.clone(),
                    },
                ));
            }
            continue;
        };

        let expr = match BindingExpr::parse(value) {
            Ok(expr) => expr,
            Err(e) => {
                violations.push(ValidationViolation::step(
                    &step.id,
                    ViolationKind::MalformedBinding {
                        field: field.clone(),
                        reason: e.to_string(),
                    },
                ));
                continue;
            }
        };

        let expected = spec.field_type;
        match &expr {
            BindingExpr::Literal(literal) => {
                let optional_null = literal.is_null() && !spec.required;
                if !optional_null && !expected.matches(literal) {
                    violations.push(ValidationViolation::step(
                        &step.id,
                        ViolationKind::InputTypeMismatch {
                            field: field.clone(),
                            expected,
                            found: json_type_name(literal).to_string(),
                        },
                    ));
                }
            }
            BindingExpr::Reference(reference) => {
                // Only single-field references are checked; deeper paths
                // point inside values the schema does not describe.
                if reference.path.len() == 1
                    && let Some(name) = reference.first_field()
                    && let Some(found) = referenced_output_type(plan, &reference.root, name, catalog)
                    && !expected.accepts(found)
                {
                    violations.push(ValidationViolation::step(
                        &step.id,
                        ViolationKind::ReferenceTypeMismatch {
                            field: field.clone(),
                            reference: reference.to_string(),
                            expected,
                            found,
                        },
                    ));
                }
            }
            BindingExpr::Template(_) => {
                if !expected.accepts(FieldType::String) {
                    violations.push(ValidationViolation::step(
                        &step.id,
                        ViolationKind::InputTypeMismatch {
                            field: field.clone(),
                            expected,
                            found: "string".to_string(),
                        },
                    ));
                }
            }
            BindingExpr::Object(_) | BindingExpr::Array(_) => {
                let found = if matches!(expr, BindingExpr::Object(_)) {
                    FieldType::Object
                } else {
                    FieldType::Array
                };
                if !expected.accepts(found) {
                    violations.push(ValidationViolation::step(
                        &step.id,
                        ViolationKind::InputTypeMismatch {
                            field: field.clone(),
                            expected,
                            found: found.as_str().to_string(),
                        },
                    ));
                }
            }
        }
    }
}

fn check_condition(step: &Step, violations: &mut Vec<ValidationViolation>) {
    if let Some(text) = &step.condition
        && let Err(e) = Condition::parse(text)
    {
        violations.push(ValidationViolation::step(
            &step.id,
            ViolationKind::MalformedCondition {
                reason: e.to_string(),
            },
        ));
    }
}

fn check_output_bindings(plan: &Plan, violations: &mut Vec<ValidationViolation>) {
    let mut owners: HashMap<&str, usize> = HashMap::new();
    for step in &plan.steps {
        if let Some(name) = &step.output_binding {
            *owners.entry(name.as_str()).or_default() += 1;
        }
    }
    for step in &plan.steps {
        let Some(name) = &step.output_binding else {
            continue;
        };
        let shadows_other_id = plan
            .steps
            .iter()
            .any(|other| other.id != step.id && other.id.as_str() == name);
        if owners.get(name.as_str()).copied().unwrap_or(0) > 1 || shadows_other_id {
            violations.push(ValidationViolation::step(
                &step.id,
                ViolationKind::DuplicateOutputBinding { name: name.clone() },
            ));
        }
    }
}

/// Every template root must name a step listed in `depends_on`.
fn check_references(plan: &Plan, step: &Step, violations: &mut Vec<ValidationViolation>) {
    let declared = |root: &str| {
        step.depends_on.iter().any(|dep| {
            dep.as_str() == root || plan.step(dep).is_some_and(|s| s.answers_to(root))
        })
    };

    for value in step.inputs.values() {
        let Ok(expr) = BindingExpr::parse(value) else {
            continue;
        };
        for reference in expr.references() {
            if !declared(&reference.root) {
                violations.push(ValidationViolation::step(
                    &step.id,
                    ViolationKind::UndeclaredReference {
                        reference: reference.to_string(),
                    },
                ));
            }
        }
    }
}

fn check_graph(plan: &Plan, violations: &mut Vec<ValidationViolation>) {
    for error in graph::check_graph(plan) {
        let violation = match error {
            GraphError::DuplicateStep(id) => {
                ValidationViolation::step(&id, ViolationKind::DuplicateStepId)
            }
            GraphError::DanglingDependency { step, missing } => {
                ValidationViolation::step(&step, ViolationKind::DanglingDependency { missing })
            }
            GraphError::Cycle(cycle) => {
                ValidationViolation::plan(ViolationKind::DependencyCycle { cycle })
            }
        };
        violations.push(violation);
    }
}

fn check_authorization(
    plan: &Plan,
    step: &Step,
    tool: &Tool,
    context: &ExecutionContext,
    violations: &mut Vec<ValidationViolation>,
) {
    let name = tool.key().to_string();
    if !tool.in_any_domain(&context.authorized_domains) {
        violations.push(ValidationViolation::step(
            &step.id,
            ViolationKind::ToolOutsideDomains { tool: name.clone() },
        ));
    }
    if !context.is_tool_authorized(&tool.name) {
        violations.push(ValidationViolation::step(
            &step.id,
            ViolationKind::ToolNotAuthorized { tool: name.clone() },
        ));
    }
    let allowed = &plan.security.allowed_domains;
    if !allowed.is_empty() && !tool.scopes.iter().any(|s| allowed.contains(s)) {
        violations.push(ValidationViolation::step(
            &step.id,
            ViolationKind::ToolOutsidePlanDomains { tool: name },
        ));
    }
}

fn check_resources(plan: &Plan, context: &ExecutionContext, violations: &mut Vec<ValidationViolation>) {
    let max_execution_time_ms = plan.security.max_execution_time_ms;

    let critical_path_ms = graph::critical_path_ms(plan);
    if critical_path_ms > max_execution_time_ms {
        violations.push(ValidationViolation::plan(ViolationKind::CriticalPathExceeded {
            critical_path_ms,
            max_execution_time_ms,
        }));
    }

    let max_tools = context.limits.max_tools;
    if plan.steps.len() > max_tools {
        violations.push(ValidationViolation::plan(ViolationKind::TooManySteps {
            steps: plan.steps.len(),
            max_tools,
        }));
    }

    let max_runtime_ms = context.limits.max_runtime_ms;
    if max_execution_time_ms > max_runtime_ms {
        violations.push(ValidationViolation::plan(
            ViolationKind::ExecutionTimeAboveSession {
                max_execution_time_ms,
                max_runtime_ms,
            },
        ));
    }
}
