//! Discover tools use case
//!
//! Embeds the goal and asks the registry for the best matching tools inside
//! the caller's authorized domains.

use crate::ports::embedding::{EmbeddingError, EmbeddingPort};
use crate::ports::tool_registry::ToolRegistryPort;
use conductor_domain::{ExecutionContext, Goal, ToolMatch};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum DiscoverToolsError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

pub struct DiscoverToolsUseCase {
    embedder: Arc<dyn EmbeddingPort>,
    registry: Arc<dyn ToolRegistryPort>,
}

impl DiscoverToolsUseCase {
    pub fn new(embedder: Arc<dyn EmbeddingPort>, registry: Arc<dyn ToolRegistryPort>) -> Self {
        Self { embedder, registry }
    }

    pub async fn execute(
        &self,
        goal: &Goal,
        context: &ExecutionContext,
        top_k: usize,
    ) -> Result<Vec<ToolMatch>, DiscoverToolsError> {
        let intent = self.embedder.embed(goal.as_str()).await?;

        let expected = self.registry.dimension();
        if intent.dimension() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: intent.dimension(),
            }
            .into());
        }

        let matches = self.registry.search(&intent, context, top_k);
        info!(
            tenant = %context.tenant,
            candidates = matches.len(),
            "Discovered candidate tools"
        );
        for m in &matches {
            debug!(tool = %m.tool.key(), similarity = m.similarity, "Candidate");
        }
        Ok(matches)
    }
}
