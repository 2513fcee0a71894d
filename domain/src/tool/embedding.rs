//! Embedding vectors and context boosting.
//!
//! Discovery ranks tools by cosine similarity between an intent vector and
//! each tool's embedding. Before ranking, a [`ContextBoost`] may transform
//! the stored embedding for the caller's [`ExecutionContext`]. Boosts are
//! deterministic and kept separate from ranking so they can be tested on
//! their own.

use crate::context::ExecutionContext;
use crate::tool::entities::Tool;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

/// Fixed-length embedding vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Cosine similarity in [-1, 1].
    ///
    /// Returns `None` when dimensions differ or either vector has zero norm.
    pub fn cosine_similarity(&self, other: &Embedding) -> Option<f32> {
        if self.dimension() != other.dimension() || self.0.is_empty() {
            return None;
        }
        let (a, b) = (self.norm(), other.norm());
        if a == 0.0 || b == 0.0 {
            return None;
        }
        let dot: f32 = self.0.iter().zip(&other.0).map(|(x, y)| x * y).sum();
        Some((dot / (a * b)).clamp(-1.0, 1.0))
    }

    /// `self + weight * other`, or `None` on dimension mismatch.
    pub fn add_scaled(&self, other: &Embedding, weight: f32) -> Option<Embedding> {
        if self.dimension() != other.dimension() {
            return None;
        }
        Some(Embedding(
            self.0.iter().zip(&other.0).map(|(x, y)| x + weight * y).collect(),
        ))
    }

    /// Unit-length copy (zero vectors are returned unchanged).
    pub fn normalized(&self) -> Embedding {
        let norm = self.norm();
        if norm == 0.0 {
            return self.clone();
        }
        Embedding(self.0.iter().map(|v| v / norm).collect())
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Context-dependent transform of a tool's stored embedding, applied before
/// similarity is computed.
pub trait ContextBoost: Send + Sync {
    fn boost<'a>(&self, tool: &'a Tool, context: &ExecutionContext) -> Cow<'a, Embedding>;
}

/// Identity transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBoost;

impl ContextBoost for NoBoost {
    fn boost<'a>(&self, tool: &'a Tool, _context: &ExecutionContext) -> Cow<'a, Embedding> {
        Cow::Borrowed(&tool.embedding)
    }
}

/// Additive tenant-preference boost: `stored + weight * preference[tenant]`.
///
/// Tenants without a preference vector, or whose vector has a different
/// dimension, see the stored embedding unchanged.
#[derive(Debug, Clone, Default)]
pub struct TenantPreferenceBoost {
    preferences: HashMap<String, Embedding>,
    weight: f32,
}

impl TenantPreferenceBoost {
    pub fn new(weight: f32) -> Self {
        Self {
            preferences: HashMap::new(),
            weight,
        }
    }

    pub fn with_preference(mut self, tenant: impl Into<String>, preference: Embedding) -> Self {
        self.preferences.insert(tenant.into(), preference);
        self
    }
}

impl ContextBoost for TenantPreferenceBoost {
    fn boost<'a>(&self, tool: &'a Tool, context: &ExecutionContext) -> Cow<'a, Embedding> {
        match self
            .preferences
            .get(&context.tenant)
            .and_then(|pref| tool.embedding.add_scaled(pref, self.weight))
        {
            Some(boosted) => Cow::Owned(boosted),
            None => Cow::Borrowed(&tool.embedding),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::ToolVersion;

    fn tool(values: Vec<f32>) -> Tool {
        Tool::new("t", ToolVersion::new(1, 0, 0), Embedding::new(values)).with_scope("crm")
    }

    #[test]
    fn test_cosine_similarity() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![1.0, 1.0]);
        let sim = a.cosine_similarity(&b).unwrap();
        assert!((sim - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert_eq!(a.cosine_similarity(&a), Some(1.0));
        assert!(a.cosine_similarity(&Embedding::new(vec![1.0])).is_none());
        assert!(a.cosine_similarity(&Embedding::new(vec![0.0, 0.0])).is_none());
    }

    #[test]
    fn test_normalized_has_unit_norm() {
        let e = Embedding::new(vec![3.0, 4.0]).normalized();
        assert!((e.norm() - 1.0).abs() < 1e-6);
        assert_eq!(Embedding::new(vec![0.0]).normalized(), Embedding::new(vec![0.0]));
    }

    #[test]
    fn test_no_boost_is_identity() {
        let t = tool(vec![0.5, 0.5]);
        let ctx = ExecutionContext::new("alice", "acme");
        assert!(matches!(NoBoost.boost(&t, &ctx), Cow::Borrowed(_)));
    }

    #[test]
    fn test_tenant_preference_boost_is_additive() {
        let t = tool(vec![1.0, 0.0]);
        let boost = TenantPreferenceBoost::new(0.5)
            .with_preference("acme", Embedding::new(vec![0.0, 2.0]));

        let acme = ExecutionContext::new("alice", "acme");
        assert_eq!(
            boost.boost(&t, &acme).into_owned(),
            Embedding::new(vec![1.0, 1.0])
        );

        let other = ExecutionContext::new("bob", "globex");
        assert_eq!(boost.boost(&t, &other).into_owned(), t.embedding);
    }

    #[test]
    fn test_tenant_preference_ignores_dimension_mismatch() {
        let t = tool(vec![1.0, 0.0]);
        let boost =
            TenantPreferenceBoost::new(1.0).with_preference("acme", Embedding::new(vec![1.0]));
        let acme = ExecutionContext::new("alice", "acme");
        assert_eq!(boost.boost(&t, &acme).into_owned(), t.embedding);
    }
}
