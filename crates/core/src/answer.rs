//! Answer-facing types
//!
//! The terminal output of the pipeline: the synthesized answer, the citations
//! backing it (1-based, matching final selection order), and retrieval
//! quality metrics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::passage::Section;

/// A citation for one selected passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based citation index, matching `[N]` references in the answer
    pub index: usize,
    pub passage_id: String,
    pub document_id: String,
    pub section: Section,
    /// First ~200 characters of the passage
    pub snippet: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Final reranker score
    pub score: f32,
    /// Human-readable per-signal breakdown for transparency
    pub relevance_reason: String,
}

/// Quality metrics for one pipeline invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub latency_ms: f64,
    /// Passages handed to synthesis
    pub retrieved_k: usize,
    /// Fraction of answer sentences that carry at least one `[N]` reference
    pub grounded_ratio: f32,
    /// Candidates dropped between fusion and final selection
    pub dedup_count: usize,
    /// Selected passages per section label
    pub section_distribution: BTreeMap<String, usize>,
}

/// Terminal pipeline output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub metrics: RetrievalMetrics,
}
