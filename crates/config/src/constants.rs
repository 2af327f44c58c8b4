//! Centralized constants for the retrieval pipeline
//!
//! Single source of truth for the tuning defaults used across the workspace.
//! Settings files and environment overrides start from these values.

/// Retrieval stage defaults
pub mod retrieval {
    /// Top-K candidates from dense (embedding) search
    pub const DENSE_TOP_K: usize = 25;

    /// Top-K candidates from lexical (BM25) search
    pub const LEXICAL_TOP_K: usize = 25;

    /// Reciprocal-rank-fusion damping constant
    pub const RRF_K: f32 = 60.0;

    /// Candidate list size after fusion (bounds reranker cost)
    pub const FUSED_TOP_K: usize = 24;

    /// Final passages handed to synthesis
    pub const SYNTHESIS_LIMIT: usize = 6;

    /// Per-document cap in the diversity selector
    pub const MAX_PER_DOCUMENT: usize = 2;

    /// Best-effort distinct-document target in the diversity selector
    pub const MIN_DOCUMENTS: usize = 3;

    /// Token-set Jaccard similarity above which a passage counts as a
    /// near-duplicate of a higher-ranked one
    pub const DUPLICATE_JACCARD: f32 = 0.95;

    /// Target character-length band for the length-fit signal
    pub const MIN_PASSAGE_CHARS: usize = 300;
    pub const MAX_PASSAGE_CHARS: usize = 800;

    /// Character budget for the synthesis context
    pub const CONTEXT_MAX_CHARS: usize = 16_000;
}

/// Reranker signal weights
///
/// The positive weights sum to 1.0 so the pre-penalty final score reads as a
/// weighted average in [0, 1]; the duplicate penalty is subtracted.
pub mod weights {
    pub const SIMILARITY: f32 = 0.36;
    pub const LEXICAL: f32 = 0.18;
    pub const KEYWORD_OVERLAP: f32 = 0.14;
    pub const SECTION_BOOST: f32 = 0.12;
    pub const RECENCY: f32 = 0.08;
    pub const AUTHORITY: f32 = 0.07;
    pub const LENGTH_FIT: f32 = 0.05;
    pub const DUPLICATE_PENALTY: f32 = 0.10;
}

/// Service endpoints (defaults for local development)
pub mod endpoints {
    /// Qdrant vector store endpoint
    pub const QDRANT_DEFAULT: &str = "http://127.0.0.1:6333";

    /// OpenAI-compatible chat completions endpoint
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";
}

/// Timeouts (milliseconds)
pub mod timeouts {
    /// Per-arm retrieval timeout (dense and lexical each)
    pub const RETRIEVAL_MS: u64 = 10_000;

    /// Synthesis call timeout
    pub const SYNTHESIS_MS: u64 = 60_000;
}
