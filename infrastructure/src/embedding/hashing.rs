//! Deterministic feature-hashing embedder.
//!
//! Text is split into lowercase word tokens (camel-case identifiers are
//! split too, so `CustomerProfileTool` shares features with
//! "customer profile"). Each token is hashed with SHA-256; the first eight
//! bytes pick a bucket and the next byte a sign. The summed vector is
//! L2-normalised.

use async_trait::async_trait;
use conductor_application::ports::embedding::{EmbeddingError, EmbeddingPort};
use conductor_domain::Embedding;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn embed_sync(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::Failed("embedding dimension must be > 0".to_string()));
        }

        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(EmbeddingError::Failed(format!("no tokens in '{}'", text)));
        }

        let mut values = vec![0.0f32; self.dimension];
        for token in &tokens {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            values[index] += sign;
        }

        Ok(Embedding::new(values).normalized())
    }
}

#[async_trait]
impl EmbeddingPort for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_sync(text)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in text.chars() {
        if !c.is_alphanumeric() {
            flush(&mut current, &mut tokens);
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            flush(&mut current, &mut tokens);
        }
        prev_lower = c.is_lowercase() || c.is_numeric();
        current.extend(c.to_lowercase());
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}
