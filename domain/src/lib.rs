//! Domain layer for conductor
//!
//! This crate contains the core entities, value objects and algorithms of
//! the orchestration engine. It has no dependencies on infrastructure or
//! presentation concerns and performs no I/O.
//!
//! # Core Concepts
//!
//! ## Tool Registry
//!
//! Tools are versioned (`name@major.minor.patch`), scoped to data domains
//! and described by input/output schemas plus an embedding used for
//! semantic discovery. See [`tool`].
//!
//! ## Plans
//!
//! A plan is a dependency graph of steps proposed by an untrusted oracle.
//! It is validated (schema, dependencies, authorization, resources,
//! attestation) before anything runs. See [`plan`].
//!
//! ## Escalation
//!
//! Low-tier drafts that look complex, uncertain or cross-domain are
//! re-planned once at the high tier. See [`escalation`].
//!
//! ## Execution
//!
//! Step and plan state machines and the aggregated report. See
//! [`execution`].

pub mod config;
pub mod context;
pub mod core;
pub mod escalation;
pub mod execution;
pub mod plan;
pub mod tool;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, OutputFormat, Severity};
pub use context::{ExecutionContext, RetentionPolicy, SessionLimits};
pub use core::{error::DomainError, goal::Goal};
pub use escalation::{
    ComplexityScore, EscalationAssessment, EscalationReason, EscalationThresholds, assess,
};
pub use execution::{ExecutionReport, PlanStatus, RunEnd, StepFailure, StepOutcome, StepStatus};
pub use plan::{
    BindingScope, Condition, FailurePolicy, Plan, PlanId, PlanTier, PlanValidator, RetryPolicy,
    SecurityConstraints, Step, StepId, TimeoutPolicy, ValidationReport, ValidationViolation,
    Verdict, ViolationCategory, ViolationKind, parse_plan, parse_plan_json,
};
pub use tool::{
    ContextBoost, DiscoveryQuery, Embedding, FieldSpec, FieldType, NoBoost, RegistryError,
    Schema, TenantPreferenceBoost, Tool, ToolCatalog, ToolError, ToolErrorCode, ToolKey, ToolMatch, ToolStats,
    ToolVersion, rank_tools,
};
