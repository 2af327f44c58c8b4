//! Query and passage embedding
//!
//! The pipeline only needs a vector per text; how vectors are produced is
//! behind the [`Embedder`] trait so a remote embedding service, a local
//! model, or the deterministic hash fallback can be swapped in.

use async_trait::async_trait;

use crate::tokenize::tokenize;
use crate::RetrievalError;

/// Produces a fixed-dimension vector for a text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;

    /// Dimension of produced vectors.
    fn dim(&self) -> usize;
}

/// Deterministic hash-based embedder.
///
/// Not semantically meaningful, but stable: identical texts embed
/// identically and token overlap yields nonzero cosine similarity. Used in
/// tests and as a last-resort fallback when no embedding service is
/// configured.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            let mut hash = 0usize;
            for c in token.chars() {
                hash = hash.wrapping_mul(31).wrapping_add(c as usize);
            }
            embedding[hash % self.dim] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }
        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(self.embed_sync(text))
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
