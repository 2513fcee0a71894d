//! Escalation criteria.
//!
//! A low-tier draft is upgraded to the high tier when any of these hold:
//!
//! - its complexity score exceeds `complexity_threshold`
//! - the oracle's confidence is below `min_confidence`
//! - the candidate tools span more than one domain
//!
//! The complexity score is
//!
//! ```text
//! raw   = tool_count * max(1, domain_count) + max(0, depth - 1)
//! score = min(1, raw / saturation)
//! ```
//!
//! where `tool_count` is the number of distinct tools in the draft,
//! `domain_count` the number of distinct scopes across the candidates and
//! `depth` the longest dependency chain of the draft.

use crate::plan::{Plan, graph};
use crate::tool::Tool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configurable escalation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationThresholds {
    pub complexity_threshold: f64,
    pub confidence_threshold: f64,
    pub complexity_saturation: f64,
    pub escalate_on_cross_domain: bool,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            complexity_threshold: 0.7,
            confidence_threshold: 0.85,
            complexity_saturation: 10.0,
            escalate_on_cross_domain: true,
        }
    }
}

impl EscalationThresholds {
    pub fn with_complexity_threshold(mut self, threshold: f64) -> Self {
        self.complexity_threshold = threshold;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn without_cross_domain(mut self) -> Self {
        self.escalate_on_cross_domain = false;
        self
    }
}

/// Deterministic complexity estimate of a draft plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexityScore {
    pub tool_count: usize,
    pub domain_count: usize,
    pub depth: usize,
    pub score: f64,
}

impl ComplexityScore {
    pub fn from_counts(tool_count: usize, domain_count: usize, depth: usize, saturation: f64) -> Self {
        let raw = tool_count * domain_count.max(1) + depth.saturating_sub(1);
        let score = if saturation > 0.0 {
            (raw as f64 / saturation).min(1.0)
        } else {
            1.0
        };
        Self {
            tool_count,
            domain_count,
            depth,
            score,
        }
    }

    pub fn compute(draft: &Plan, candidates: &[Tool], saturation: f64) -> Self {
        Self::from_counts(
            draft.tool_names().len(),
            candidate_domains(candidates).len(),
            graph::depth(draft),
            saturation,
        )
    }
}

fn candidate_domains(candidates: &[Tool]) -> BTreeSet<&str> {
    candidates
        .iter()
        .flat_map(|t| t.scopes.iter().map(String::as_str))
        .collect()
}

/// Why a draft should be escalated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EscalationReason {
    Complexity { score: f64, threshold: f64 },
    LowConfidence { confidence: f64, threshold: f64 },
    CrossDomain { domains: Vec<String> },
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscalationReason::Complexity { score, threshold } => {
                write!(f, "complexity {:.2} > {:.2}", score, threshold)
            }
            EscalationReason::LowConfidence {
                confidence,
                threshold,
            } => write!(f, "confidence {:.2} < {:.2}", confidence, threshold),
            EscalationReason::CrossDomain { domains } => {
                write!(f, "candidates span domains {}", domains.join(", "))
            }
        }
    }
}

/// Result of applying the thresholds to a draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationAssessment {
    pub complexity: ComplexityScore,
    pub reasons: Vec<EscalationReason>,
}

impl EscalationAssessment {
    pub fn should_escalate(&self) -> bool {
        !self.reasons.is_empty()
    }
}

pub fn assess(draft: &Plan, candidates: &[Tool], thresholds: &EscalationThresholds) -> EscalationAssessment {
    let complexity = ComplexityScore::compute(draft, candidates, thresholds.complexity_saturation);
    let mut reasons = Vec::new();

    if complexity.score > thresholds.complexity_threshold {
        reasons.push(EscalationReason::Complexity {
            score: complexity.score,
            threshold: thresholds.complexity_threshold,
        });
    }

    // NaN confidence counts as low
    if !(draft.confidence >= thresholds.confidence_threshold) {
        reasons.push(EscalationReason::LowConfidence {
            confidence: draft.confidence,
            threshold: thresholds.confidence_threshold,
        });
    }

    let domains = candidate_domains(candidates);
    if thresholds.escalate_on_cross_domain && domains.len() > 1 {
        reasons.push(EscalationReason::CrossDomain {
            domains: domains.into_iter().map(str::to_string).collect(),
        });
    }

    EscalationAssessment {
        complexity,
        reasons,
    }
}
