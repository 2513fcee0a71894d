//! Semantic tool discovery.
//!
//! Ranking is a pure function of a catalog snapshot, an intent vector, the
//! caller's context and a [`ContextBoost`]:
//!
//! 1. Only the latest active version of each tool name competes.
//! 2. Tools outside the context's authorized domains (or allow-list) are
//!    dropped before any similarity is computed.
//! 3. The remaining embeddings are boosted, compared with the intent by
//!    cosine similarity and filtered by the threshold.
//! 4. Results are sorted by similarity (descending, ties by name) and cut
//!    to `top_k`.

use super::catalog::ToolCatalog;
use super::embedding::{ContextBoost, Embedding};
use super::entities::Tool;
use crate::context::ExecutionContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference default for the minimum similarity of a candidate.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;

/// Parameters of one discovery request.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryQuery<'a> {
    pub intent: &'a Embedding,
    pub context: &'a ExecutionContext,
    pub top_k: usize,
    pub threshold: f32,
}

impl<'a> DiscoveryQuery<'a> {
    pub fn new(intent: &'a Embedding, context: &'a ExecutionContext) -> Self {
        Self {
            intent,
            context,
            top_k: 5,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

/// A discovered tool with its similarity to the intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMatch {
    pub tool: Tool,
    pub similarity: f32,
}

/// Rank the catalog's tools for a query.
pub fn rank_tools(
    catalog: &ToolCatalog,
    query: &DiscoveryQuery<'_>,
    boost: &dyn ContextBoost,
) -> Vec<ToolMatch> {
    if query.top_k == 0 {
        return Vec::new();
    }

    let mut latest: BTreeMap<&str, &Tool> = BTreeMap::new();
    for tool in catalog.active() {
        // catalog iterates in ascending version order per name
        latest.insert(tool.name.as_str(), tool);
    }

    let mut matches: Vec<ToolMatch> = latest
        .into_values()
        .filter(|tool| {
            query.context.is_any_domain_authorized(&tool.scopes)
                && query.context.is_tool_authorized(&tool.name)
        })
        .filter_map(|tool| {
            let boosted = boost.boost(tool, query.context);
            let similarity = query.intent.cosine_similarity(&boosted)?;
            (similarity >= query.threshold).then(|| ToolMatch {
                tool: tool.clone(),
                similarity,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.tool.name.cmp(&b.tool.name))
    });
    matches.truncate(query.top_k);
    matches
}
