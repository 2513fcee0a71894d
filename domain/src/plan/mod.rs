//! Plan domain module
//!
//! A [`Plan`] is an ordered set of [`Step`]s, each invoking one pinned tool
//! with inputs that may reference earlier outputs. Plans come from an
//! untrusted oracle, so everything here is about checking them:
//!
//! - [`binding`]: `${step.field}` references as an AST
//! - [`condition`]: boolean step conditions
//! - [`graph`]: dependency ordering, cycles and the critical path
//! - [`attestation`]: content hash over the body and tool schemas
//! - [`validation`]: the full validator
//! - [`parser`]: plan DSL parsing from oracle text

pub mod attestation;
pub mod binding;
pub mod condition;
pub mod entities;
pub mod graph;
pub mod parser;
pub mod validation;
pub mod value_objects;

pub use attestation::{AttestationCheck, AttestationError, compute_attestation, seal, verify};
pub use binding::{BindingError, BindingExpr, BindingScope, PathSegment, Reference, resolve_inputs};
pub use condition::{Condition, ConditionError};
pub use entities::{FailurePolicy, Plan, RetryPolicy, SecurityConstraints, Step, TimeoutPolicy};
pub use graph::{GraphError, critical_path_ms, depth, find_cycles, topological_order};
pub use parser::{PlanParseError, parse_plan, parse_plan_json};
pub use validation::{
    PlanValidator, ValidationReport, ValidationViolation, Verdict, ViolationCategory, ViolationKind,
};
pub use value_objects::{PlanId, PlanTier, StepId};
