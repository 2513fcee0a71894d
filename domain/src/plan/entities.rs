//! Plan domain entities

use super::value_objects::{PlanId, PlanTier, StepId};
use crate::tool::entities::{ToolKey, ToolVersion};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::time::Duration;

fn default_step_timeout_ms() -> u64 {
    10_000
}

/// Exponential backoff retry policy for a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 100,
            multiplier: 2.0,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, initial_ms: u64, multiplier: f64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.multiplier = multiplier;
        self.max_backoff_ms = max_ms;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the `retry`-th retry (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

/// What happens to a plan when its global deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// The plan fails
    #[default]
    Fail,
    /// The plan ends PartiallyCompleted, keeping every succeeded step
    PartialResults,
}

/// How non-critical step failures affect the rest of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any step failure fails the plan and cancels outstanding work
    #[default]
    FailFast,
    /// A failed branch is blocked; independent branches continue
    GracefulDegradation,
}

/// Security constraints declared by a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConstraints {
    pub max_execution_time_ms: u64,
    /// Domains the plan may touch. Empty means "whatever the context allows".
    pub allowed_domains: Vec<String>,
    pub on_timeout: TimeoutPolicy,
}

impl Default for SecurityConstraints {
    fn default() -> Self {
        Self {
            max_execution_time_ms: 30_000,
            allowed_domains: Vec::new(),
            on_timeout: TimeoutPolicy::Fail,
        }
    }
}

/// One tool invocation within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(alias = "step_id")]
    pub id: StepId,
    /// Referenced tool name
    pub tool: String,
    /// Pinned tool version. Unpinned steps never pass validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<ToolVersion>,
    /// Input bindings: literal JSON, with `${step.field}` templates in strings
    #[serde(default, alias = "input", alias = "args")]
    pub inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    #[serde(default = "default_step_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_binding: Option<String>,
    /// A critical step's failure always fails the plan
    #[serde(default)]
    pub critical: bool,
}

impl Step {
    pub fn new(id: impl Into<StepId>, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            tool_version: None,
            inputs: Map::new(),
            condition: None,
            depends_on: Vec::new(),
            timeout_ms: default_step_timeout_ms(),
            retry: RetryPolicy::default(),
            output_binding: None,
            critical: false,
        }
    }

    pub fn with_version(mut self, version: ToolVersion) -> Self {
        self.tool_version = Some(version);
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_dependency(mut self, step: impl Into<StepId>) -> Self {
        self.depends_on.push(step.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_output_binding(mut self, name: impl Into<String>) -> Self {
        self.output_binding = Some(name.into());
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Name under which this step's output is bound for later steps.
    pub fn binding_name(&self) -> &str {
        self.output_binding
            .as_deref()
            .unwrap_or_else(|| self.id.as_str())
    }

    /// Whether `name` refers to this step (by id or output binding).
    pub fn answers_to(&self, name: &str) -> bool {
        self.id.as_str() == name || self.output_binding.as_deref() == Some(name)
    }

    pub fn tool_key(&self) -> Option<ToolKey> {
        self.tool_version
            .map(|version| ToolKey::new(self.tool.clone(), version))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A proposed or executed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub id: PlanId,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub tier: PlanTier,
    /// Self-reported confidence of the generating oracle, in [0, 1]
    #[serde(default)]
    pub confidence: f64,
    pub steps: Vec<Step>,
    #[serde(default, alias = "security_constraints")]
    pub security: SecurityConstraints,
    #[serde(default)]
    pub on_tool_failure: FailurePolicy,
    /// Content hash binding the plan body to the referenced tool schemas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, tier: PlanTier) -> Self {
        Self {
            id: PlanId::generate(),
            goal: goal.into(),
            tier,
            confidence: 0.0,
            steps: Vec::new(),
            security: SecurityConstraints::default(),
            on_tool_failure: FailurePolicy::default(),
            attestation: None,
        }
    }

    pub fn with_id(mut self, id: PlanId) -> Self {
        self.id = id;
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_security(mut self, security: SecurityConstraints) -> Self {
        self.security = security;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_tool_failure = policy;
        self
    }

    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// Find a step by id or output binding name.
    pub fn step_answering_to(&self, name: &str) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| s.id.as_str() == name)
            .or_else(|| self.steps.iter().find(|s| s.answers_to(name)))
    }

    /// Distinct tool names referenced by the plan.
    pub fn tool_names(&self) -> BTreeSet<&str> {
        self.steps.iter().map(|s| s.tool.as_str()).collect()
    }

    /// Distinct pinned tool keys referenced by the plan.
    pub fn tool_keys(&self) -> BTreeSet<ToolKey> {
        self.steps.iter().filter_map(|s| s.tool_key()).collect()
    }

    pub fn is_sealed(&self) -> bool {
        self.attestation.is_some()
    }
}
