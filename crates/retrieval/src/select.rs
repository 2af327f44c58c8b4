//! Diversity selection
//!
//! Final cut of the reranked list before synthesis: cap how many passages
//! any single document may contribute so the context isn't six excerpts of
//! one paper, while aiming for a minimum number of distinct documents.

use std::collections::HashMap;

use tracing::debug;

use scilit_config::RetrievalConfig;

use crate::rerank::RankedResult;

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Passages any one document may contribute.
    pub max_per_document: usize,
    /// Best-effort distinct-document target.
    pub min_documents: usize,
    /// Final selection size.
    pub limit: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_per_document: 2,
            min_documents: 3,
            limit: 6,
        }
    }
}

impl From<&RetrievalConfig> for SelectorConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            max_per_document: config.max_per_document,
            min_documents: config.min_documents,
            limit: config.synthesis_limit,
        }
    }
}

/// Selection outcome, preserving rerank order.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub passages: Vec<RankedResult>,
    pub distinct_documents: usize,
    /// True when the per-document cap was lifted to fill the selection from
    /// a corpus with too few distinct documents.
    pub cap_relaxed: bool,
}

pub struct DiversitySelector {
    config: SelectorConfig,
}

impl DiversitySelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Greedy pass in rerank order, honoring the per-document cap. The cap
    /// is lifted in a second pass only when the input itself has too few
    /// distinct documents to reach the target; already selected passages
    /// are never evicted.
    pub fn select(&self, ranked: &[RankedResult]) -> SelectionResult {
        let mut selected: Vec<RankedResult> = Vec::with_capacity(self.config.limit);
        let mut per_document: HashMap<&str, usize> = HashMap::new();
        let mut skipped: Vec<usize> = Vec::new();

        for (idx, result) in ranked.iter().enumerate() {
            if selected.len() == self.config.limit {
                break;
            }
            let count = per_document
                .entry(result.passage.document_id.as_str())
                .or_insert(0);
            if *count < self.config.max_per_document {
                *count += 1;
                selected.push(result.clone());
            } else {
                skipped.push(idx);
            }
        }

        let distinct = per_document.values().filter(|c| **c > 0).count();
        let mut cap_relaxed = false;

        // Only a corpus-poverty situation justifies lifting the cap: the
        // capped pass ran out of input before filling the selection, and
        // even so the distinct-document target is unreachable.
        if selected.len() < self.config.limit && distinct < self.config.min_documents {
            for idx in skipped {
                if selected.len() == self.config.limit {
                    break;
                }
                cap_relaxed = true;
                selected.push(ranked[idx].clone());
            }
            if cap_relaxed {
                // Re-assert rerank order after appending skipped entries
                selected.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.passage.id.cmp(&b.passage.id))
                });
                debug!(
                    distinct_documents = distinct,
                    "per-document cap relaxed to fill selection"
                );
            }
        }

        let distinct_documents = {
            let mut docs: Vec<&str> = selected
                .iter()
                .map(|r| r.passage.document_id.as_str())
                .collect();
            docs.sort_unstable();
            docs.dedup();
            docs.len()
        };

        SelectionResult {
            passages: selected,
            distinct_documents,
            cap_relaxed,
        }
    }
}
