//! Hybrid retrieval and reranking for scientific literature
//!
//! Features:
//! - Term-expansion dictionary for domain vocabulary
//! - Lexical BM25 search via Tantivy with scientific tokenization
//! - Dense vector search via Qdrant behind a narrow trait
//! - Reciprocal rank fusion of both candidate lists
//! - Eight-signal reranking with full per-signal breakdown
//! - Greedy diversity selection with per-document caps
//! - Context building and strict-citation synthesis

pub mod context;
pub mod corpus;
pub mod dense;
pub mod embedding;
pub mod expansion;
pub mod fusion;
pub mod lexical;
pub mod pipeline;
pub mod rerank;
pub mod select;
pub mod synthesis;
pub mod tokenize;

pub use context::{ContextBuilder, ContextConfig};
pub use corpus::Corpus;
pub use dense::{DenseHit, DenseRetriever, QdrantDenseRetriever, SearchFilter};
pub use embedding::{Embedder, HashEmbedder};
pub use expansion::{DictionarySource, ExpandedQuery, JsonFileSource, TermDictionary};
pub use fusion::{fuse, Candidate, FusedCandidate, FusionConfig};
pub use lexical::{LexicalConfig, LexicalHit, LexicalIndex};
pub use pipeline::{index_corpus, RagPipeline, RagPipelineBuilder, RetrievalOutcome};
pub use rerank::{RankedResult, Reranker, RerankerConfig, SectionBoosts, SignalBreakdown};
pub use select::{DiversitySelector, SelectionResult, SelectorConfig};
pub use synthesis::{OpenAiSynthesizer, Synthesizer, NO_EVIDENCE_ANSWER};

use thiserror::Error;

/// Retrieval pipeline errors
///
/// An empty corpus and an empty final selection are valid outcomes, not
/// errors; they surface as empty lists / a zero-passage answer.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Upstream retriever unavailable ({source_name}): {message}")]
    UpstreamUnavailable {
        source_name: &'static str,
        message: String,
    },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Retrieval timed out after {0} ms")]
    Timeout(u64),
}

impl From<RetrievalError> for scilit_core::Error {
    fn from(err: RetrievalError) -> Self {
        scilit_core::Error::Retrieval(err.to_string())
    }
}
