//! Embedding port
//!
//! Turns goal text into the fixed-dimension vector used for discovery.

use async_trait::async_trait;
use conductor_domain::Embedding;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding failed: {0}")]
    Failed(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Port for text embedding
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    /// Dimension of every vector this embedder produces.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;
}
