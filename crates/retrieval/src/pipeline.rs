//! Retrieval pipeline orchestration
//!
//! Wires the stages together: term expansion, parallel dense + lexical
//! retrieval, RRF fusion, multi-signal reranking, diversity selection,
//! context assembly and synthesis. Either retrieval arm may fail; the
//! pipeline degrades to the surviving arm and only errors when both are
//! down.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{debug, info, warn};

use scilit_config::Settings;
use scilit_core::{Citation, Passage, RagAnswer, RetrievalMetrics};

use crate::context::{ContextBuilder, ContextConfig};
use crate::corpus::Corpus;
use crate::dense::{DenseHit, DenseRetriever, SearchFilter};
use crate::embedding::Embedder;
use crate::expansion::{ExpandedQuery, TermDictionary};
use crate::fusion::{fuse, Candidate, FusionConfig};
use crate::lexical::{LexicalConfig, LexicalHit, LexicalIndex};
use crate::rerank::{Reranker, RerankerConfig};
use crate::select::{DiversitySelector, SelectionResult, SelectorConfig};
use crate::synthesis::{estimate_grounding, Synthesizer, NO_EVIDENCE_ANSWER};
use crate::RetrievalError;

const SNIPPET_CHARS: usize = 200;

/// Everything the pipeline produced up to (and including) selection.
/// Exposed separately from [`RagPipeline::answer`] so retrieval quality can
/// be inspected without a synthesis round-trip.
pub struct RetrievalOutcome {
    pub expanded: ExpandedQuery,
    pub selection: SelectionResult,
    /// Fused candidate count before reranking and selection.
    pub fused_len: usize,
}

pub struct RagPipelineBuilder {
    settings: Settings,
    corpus: Corpus,
    dictionary: TermDictionary,
    dense: Option<Arc<dyn DenseRetriever>>,
    embedder: Option<Arc<dyn Embedder>>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
}

impl RagPipelineBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            corpus: Corpus::empty(),
            dictionary: TermDictionary::empty(),
            dense: None,
            embedder: None,
            synthesizer: None,
        }
    }

    pub fn corpus(mut self, corpus: Corpus) -> Self {
        self.corpus = corpus;
        self
    }

    pub fn dictionary(mut self, dictionary: TermDictionary) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub fn dense(mut self, dense: Arc<dyn DenseRetriever>) -> Self {
        self.dense = Some(dense);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn build(self) -> Result<RagPipeline, RetrievalError> {
        let dense = self
            .dense
            .ok_or_else(|| RetrievalError::Index("dense retriever not provided".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| RetrievalError::Index("embedder not provided".to_string()))?;
        let synthesizer = self
            .synthesizer
            .ok_or_else(|| RetrievalError::Index("synthesizer not provided".to_string()))?;

        let retrieval = &self.settings.retrieval;
        let lexical = LexicalIndex::build(
            &self.corpus.to_vec(),
            LexicalConfig {
                top_k: retrieval.lexical_top_k,
                ..LexicalConfig::default()
            },
        )?;

        info!(
            passages = self.corpus.len(),
            dictionary_entries = self.dictionary.len(),
            "retrieval pipeline ready"
        );

        Ok(RagPipeline {
            corpus: Arc::new(self.corpus),
            dictionary: self.dictionary,
            lexical: Arc::new(lexical),
            dense,
            embedder,
            synthesizer,
            fusion: FusionConfig::from(retrieval),
            reranker: Reranker::new(RerankerConfig::from(retrieval)),
            selector: DiversitySelector::new(SelectorConfig::from(retrieval)),
            context_builder: ContextBuilder::new(ContextConfig::from(retrieval)),
            dense_top_k: retrieval.dense_top_k,
            lexical_top_k: retrieval.lexical_top_k,
            arm_timeout: Duration::from_millis(retrieval.retrieval_timeout_ms),
        })
    }
}

pub struct RagPipeline {
    corpus: Arc<Corpus>,
    dictionary: TermDictionary,
    lexical: Arc<LexicalIndex>,
    dense: Arc<dyn DenseRetriever>,
    embedder: Arc<dyn Embedder>,
    synthesizer: Arc<dyn Synthesizer>,
    fusion: FusionConfig,
    reranker: Reranker,
    selector: DiversitySelector,
    context_builder: ContextBuilder,
    dense_top_k: usize,
    lexical_top_k: usize,
    arm_timeout: Duration,
}

impl RagPipeline {
    pub fn builder(settings: Settings) -> RagPipelineBuilder {
        RagPipelineBuilder::new(settings)
    }

    /// Run the pipeline through selection. Zero selected passages is a
    /// valid outcome, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        let expanded = self.dictionary.expand(query);
        if !expanded.matched_keys.is_empty() {
            debug!(
                matched = expanded.matched_keys.len(),
                terms = expanded.terms.len(),
                "query expanded"
            );
        }

        if self.corpus.is_empty() {
            return Ok(RetrievalOutcome {
                expanded,
                selection: self.selector.select(&[]),
                fused_len: 0,
            });
        }

        let (dense_hits, lexical_hits) = self.search_arms(&expanded, filter).await?;

        let dense_candidates = self.join_dense(&dense_hits);
        let lexical_candidates = self.join_lexical(&lexical_hits);

        let fused = fuse(&dense_candidates, &lexical_candidates, &self.fusion);
        let fused_len = fused.len();

        let ranked = self.reranker.rerank(&fused, &expanded);
        let selection = self.selector.select(&ranked);

        debug!(
            dense = dense_candidates.len(),
            lexical = lexical_candidates.len(),
            fused = fused_len,
            selected = selection.passages.len(),
            "retrieval completed"
        );

        Ok(RetrievalOutcome {
            expanded,
            selection,
            fused_len,
        })
    }

    /// Full question answering: retrieve, build context, synthesize, cite.
    pub async fn answer(&self, question: &str) -> Result<RagAnswer, RetrievalError> {
        let started = Instant::now();
        let outcome = self.retrieve(question, None).await?;
        let selected = &outcome.selection.passages;

        if selected.is_empty() {
            return Ok(RagAnswer {
                answer: NO_EVIDENCE_ANSWER.to_string(),
                citations: Vec::new(),
                metrics: RetrievalMetrics {
                    latency_ms: started.elapsed().as_secs_f64() * 1000.0,
                    retrieved_k: 0,
                    grounded_ratio: 0.0,
                    dedup_count: outcome.fused_len,
                    section_distribution: BTreeMap::new(),
                },
            });
        }

        let (context, included) = self.context_builder.build(selected);
        let cited = &selected[..included];

        let answer = self.synthesizer.synthesize(question, &context).await?;

        let citations: Vec<Citation> = cited
            .iter()
            .enumerate()
            .map(|(i, result)| Citation {
                index: i + 1,
                passage_id: result.passage.id.clone(),
                document_id: result.passage.document_id.clone(),
                section: result.passage.section,
                snippet: snippet(&result.passage.text),
                source_url: result.passage.source_url.clone(),
                year: result.passage.year,
                score: result.score,
                relevance_reason: result
                    .signals
                    .relevance_reason(&self.reranker_weights()),
            })
            .collect();

        let mut section_distribution: BTreeMap<String, usize> = BTreeMap::new();
        for result in cited {
            *section_distribution
                .entry(result.passage.section.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(RagAnswer {
            answer: answer.clone(),
            citations,
            metrics: RetrievalMetrics {
                latency_ms: started.elapsed().as_secs_f64() * 1000.0,
                retrieved_k: included,
                grounded_ratio: estimate_grounding(&answer),
                dedup_count: outcome.fused_len.saturating_sub(included),
                section_distribution,
            },
        })
    }

    /// Run both arms in parallel. A failed arm degrades to an empty list
    /// with a warning; both failing is an upstream outage.
    async fn search_arms(
        &self,
        expanded: &ExpandedQuery,
        filter: Option<&SearchFilter>,
    ) -> Result<(Vec<DenseHit>, Vec<LexicalHit>), RetrievalError> {
        let dense_future = async {
            let vector = timeout(self.arm_timeout, self.embedder.embed(&expanded.expanded_text))
                .await
                .map_err(|_| RetrievalError::Timeout(self.arm_timeout.as_millis() as u64))??;
            timeout(
                self.arm_timeout,
                self.dense.search(&vector, self.dense_top_k, filter),
            )
            .await
            .map_err(|_| RetrievalError::Timeout(self.arm_timeout.as_millis() as u64))?
        };

        // Tantivy search is CPU-bound, keep it off the async executor
        let lexical_index = Arc::clone(&self.lexical);
        let terms = expanded.terms_vec();
        let lexical_top_k = self.lexical_top_k;
        let lexical_future = async move {
            timeout(
                self.arm_timeout,
                tokio::task::spawn_blocking(move || {
                    lexical_index.search_terms(&terms, Some(lexical_top_k))
                }),
            )
            .await
            .map_err(|_| RetrievalError::Timeout(self.arm_timeout.as_millis() as u64))?
            .map_err(|e| RetrievalError::Search(format!("lexical task failed: {e}")))?
        };

        let (dense_result, lexical_result) = tokio::join!(dense_future, lexical_future);

        match (dense_result, lexical_result) {
            (Ok(dense), Ok(lexical)) => Ok((dense, lexical)),
            (Err(e), Ok(lexical)) => {
                warn!(error = %e, "dense arm failed, degrading to lexical only");
                Ok((Vec::new(), lexical))
            }
            (Ok(dense), Err(e)) => {
                warn!(error = %e, "lexical arm failed, degrading to dense only");
                Ok((dense, Vec::new()))
            }
            (Err(dense_err), Err(lexical_err)) => Err(RetrievalError::UpstreamUnavailable {
                source_name: "dense+lexical",
                message: format!("dense: {dense_err}; lexical: {lexical_err}"),
            }),
        }
    }

    fn join_dense(&self, hits: &[DenseHit]) -> Vec<Candidate> {
        hits.iter()
            .filter_map(|hit| match self.corpus.get(&hit.id) {
                Some(passage) => Some(Candidate {
                    passage: Arc::clone(passage),
                    score: hit.similarity,
                }),
                None => {
                    warn!(id = %hit.id, "dense hit not in corpus, skipping");
                    None
                }
            })
            .collect()
    }

    fn join_lexical(&self, hits: &[LexicalHit]) -> Vec<Candidate> {
        hits.iter()
            .filter_map(|hit| match self.corpus.get(&hit.id) {
                Some(passage) => Some(Candidate {
                    passage: Arc::clone(passage),
                    score: hit.score,
                }),
                None => {
                    warn!(id = %hit.id, "lexical hit not in corpus, skipping");
                    None
                }
            })
            .collect()
    }

    fn reranker_weights(&self) -> scilit_config::SignalWeights {
        self.reranker.weights()
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= SNIPPET_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(SNIPPET_CHARS).collect();
        format!("{}…", cut.trim_end())
    }
}

/// Index every corpus passage into a dense retriever that supports
/// ingestion. Embeds with the pipeline's embedder.
pub async fn index_corpus(
    corpus: &Corpus,
    embedder: &dyn Embedder,
    dense: &crate::dense::QdrantDenseRetriever,
) -> Result<usize, RetrievalError> {
    dense.ensure_collection().await?;

    let passages: Vec<Passage> = corpus.passages().iter().map(|p| (**p).clone()).collect();
    let mut embeddings = Vec::with_capacity(passages.len());
    for passage in &passages {
        embeddings.push(embedder.embed(&passage.text).await?);
    }

    dense.upsert(&passages, &embeddings).await?;
    info!(passages = passages.len(), "corpus indexed into dense store");
    Ok(passages.len())
}
