//! Reciprocal Rank Fusion
//!
//! Merges the dense and lexical candidate lists by rank rather than by raw
//! score, so BM25 scores and cosine similarities never need to share a
//! scale. Each list contributes `1 / (K + rank)` per passage; passages in
//! both lists accumulate both contributions.

use std::collections::HashMap;
use std::sync::Arc;

use scilit_config::RetrievalConfig;
use scilit_core::Passage;

/// A ranked candidate from one retrieval arm, carrying its raw arm score.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub passage: Arc<Passage>,
    pub score: f32,
}

/// A candidate after fusion. Raw arm scores are carried through for the
/// reranker's similarity and lexical signals.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub passage: Arc<Passage>,
    /// Accumulated RRF score.
    pub score: f32,
    /// Cosine similarity from the dense arm, if it returned this passage.
    pub similarity: Option<f32>,
    /// Raw BM25 score from the lexical arm, if it returned this passage.
    pub lexical_score: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// RRF damping constant. Larger values flatten the rank discount.
    pub rrf_k: f32,
    /// Fused list size handed to the reranker.
    pub top_k: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            top_k: 24,
        }
    }
}

impl From<&RetrievalConfig> for FusionConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            rrf_k: config.rrf_k,
            top_k: config.fused_top_k,
        }
    }
}

struct Accumulator {
    passage: Arc<Passage>,
    score: f32,
    similarity: Option<f32>,
    lexical_score: Option<f32>,
}

/// Fuse the two arms. Either list may be empty, which reduces to a pure
/// rank rescale of the other; both arms weigh equally, so argument order
/// does not affect the result. Ties break by passage id.
pub fn fuse(
    dense: &[Candidate],
    lexical: &[Candidate],
    config: &FusionConfig,
) -> Vec<FusedCandidate> {
    let mut by_id: HashMap<String, Accumulator> = HashMap::new();

    for (rank, candidate) in dense.iter().enumerate() {
        let contribution = 1.0 / (config.rrf_k + (rank + 1) as f32);
        let entry = by_id
            .entry(candidate.passage.id.clone())
            .or_insert_with(|| Accumulator {
                passage: Arc::clone(&candidate.passage),
                score: 0.0,
                similarity: None,
                lexical_score: None,
            });
        entry.score += contribution;
        entry.similarity = Some(candidate.score);
    }

    for (rank, candidate) in lexical.iter().enumerate() {
        let contribution = 1.0 / (config.rrf_k + (rank + 1) as f32);
        let entry = by_id
            .entry(candidate.passage.id.clone())
            .or_insert_with(|| Accumulator {
                passage: Arc::clone(&candidate.passage),
                score: 0.0,
                similarity: None,
                lexical_score: None,
            });
        entry.score += contribution;
        entry.lexical_score = Some(candidate.score);
    }

    let mut fused: Vec<FusedCandidate> = by_id
        .into_values()
        .map(|acc| FusedCandidate {
            passage: acc.passage,
            score: acc.score,
            similarity: acc.similarity,
            lexical_score: acc.lexical_score,
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.passage.id.cmp(&b.passage.id))
    });
    fused.truncate(config.top_k);
    fused
}
