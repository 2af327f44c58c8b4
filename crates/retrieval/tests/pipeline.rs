//! End-to-end pipeline tests with in-process stand-ins for the dense store
//! and the synthesis endpoint.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use scilit_config::Settings;
use scilit_core::{Passage, Section};
use scilit_retrieval::{
    Corpus, DenseHit, DenseRetriever, HashEmbedder, RagPipeline, RetrievalError, SearchFilter,
    Synthesizer, TermDictionary, NO_EVIDENCE_ANSWER,
};

/// Dense retriever returning a fixed hit list.
struct StaticDense {
    hits: Vec<DenseHit>,
}

impl StaticDense {
    fn new(hits: Vec<(&str, f32)>) -> Arc<Self> {
        Arc::new(Self {
            hits: hits
                .into_iter()
                .map(|(id, similarity)| DenseHit {
                    id: id.to_string(),
                    similarity,
                })
                .collect(),
        })
    }

    fn empty() -> Arc<Self> {
        Arc::new(Self { hits: Vec::new() })
    }
}

#[async_trait]
impl DenseRetriever for StaticDense {
    async fn search(
        &self,
        _query_vector: &[f32],
        top_k: usize,
        _filter: Option<&SearchFilter>,
    ) -> Result<Vec<DenseHit>, RetrievalError> {
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }
}

/// Dense retriever that is always down.
struct FailingDense;

#[async_trait]
impl DenseRetriever for FailingDense {
    async fn search(
        &self,
        _query_vector: &[f32],
        _top_k: usize,
        _filter: Option<&SearchFilter>,
    ) -> Result<Vec<DenseHit>, RetrievalError> {
        Err(RetrievalError::UpstreamUnavailable {
            source_name: "dense",
            message: "connection refused".to_string(),
        })
    }
}

/// Synthesizer returning a canned cited answer and counting invocations.
struct CannedSynthesizer {
    calls: AtomicUsize,
}

impl CannedSynthesizer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Synthesizer for CannedSynthesizer {
    async fn synthesize(&self, _question: &str, context: &str) -> Result<String, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(context.contains("[1]"), "context must contain numbered blocks");
        Ok("Bone density declined under spaceflight conditions [1]. \
            Recovery was incomplete after return [2]."
            .to_string())
    }
}

fn passage(id: &str, doc: &str, section: Section, text: &str, year: i32) -> Passage {
    Passage {
        id: id.to_string(),
        document_id: doc.to_string(),
        section,
        text: text.to_string(),
        source_url: Some("https://www.nasa.gov/paper".to_string()),
        year: Some(year),
    }
}

fn space_biology_corpus() -> Corpus {
    Corpus::from_passages(vec![
        passage(
            "p-weightless",
            "doc-a",
            Section::Results,
            "Weightlessness exposure for thirty days reduced femoral bone density \
             by twelve percent in flight mice compared with ground controls.",
            2024,
        ),
        passage(
            "p-radiation",
            "doc-b",
            Section::Results,
            "Cosmic radiation dosage correlated with elevated DNA damage markers \
             in lymphocyte samples collected post-flight.",
            2023,
        ),
        passage(
            "p-plants",
            "doc-c",
            Section::Discussion,
            "Arabidopsis root growth reoriented within hours of clinorotation, \
             suggesting rapid gravitropic adaptation.",
            2022,
        ),
    ])
}

fn dictionary() -> TermDictionary {
    let mut entries = BTreeMap::new();
    entries.insert(
        "microgravity".to_string(),
        ["weightlessness", "spaceflight"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    TermDictionary::from_entries(entries)
}

#[tokio::test]
async fn test_expansion_bridges_vocabulary_gap() {
    // The corpus says "weightlessness"; the query says "microgravity".
    // Only the expansion dictionary connects the two for the lexical arm.
    let pipeline = RagPipeline::builder(Settings::default())
        .corpus(space_biology_corpus())
        .dictionary(dictionary())
        .dense(StaticDense::empty())
        .embedder(Arc::new(HashEmbedder::default()))
        .synthesizer(CannedSynthesizer::new())
        .build()
        .unwrap();

    let outcome = pipeline
        .retrieve("microgravity effects on bone", None)
        .await
        .unwrap();

    assert!(outcome.expanded.matched_keys.contains("microgravity"));
    let top = &outcome.selection.passages[0];
    assert_eq!(top.passage.id, "p-weightless");
    assert!(top.signals.keyword_overlap > 0.0);
}

#[tokio::test]
async fn test_near_duplicate_ranks_below_distinct_passage() {
    let duplicate_text = "Weightlessness exposure for thirty days reduced femoral bone \
         density by twelve percent in flight mice compared with ground controls.";
    let mut passages = space_biology_corpus().to_vec();
    passages.push(passage(
        "p-weightless-copy",
        "doc-d",
        Section::Results,
        duplicate_text,
        2024,
    ));

    let pipeline = RagPipeline::builder(Settings::default())
        .corpus(Corpus::from_passages(passages))
        .dictionary(dictionary())
        .dense(StaticDense::new(vec![
            ("p-weightless", 0.9),
            ("p-weightless-copy", 0.88),
            ("p-radiation", 0.4),
        ]))
        .embedder(Arc::new(HashEmbedder::default()))
        .synthesizer(CannedSynthesizer::new())
        .build()
        .unwrap();

    let outcome = pipeline
        .retrieve("microgravity bone density loss", None)
        .await
        .unwrap();

    let ids: Vec<&str> = outcome
        .selection
        .passages
        .iter()
        .map(|r| r.passage.id.as_str())
        .collect();
    let original = ids.iter().position(|id| *id == "p-weightless").unwrap();
    let copy = ids.iter().position(|id| *id == "p-weightless-copy").unwrap();
    assert!(original < copy, "duplicate must rank below the original");

    let copy_result = outcome
        .selection
        .passages
        .iter()
        .find(|r| r.passage.id == "p-weightless-copy")
        .unwrap();
    assert_eq!(copy_result.signals.duplicate_penalty, 1.0);
}

#[tokio::test]
async fn test_single_document_corpus_fills_selection_past_cap() {
    let passages: Vec<Passage> = (0..5)
        .map(|i| {
            passage(
                &format!("p{i}"),
                "doc-only",
                Section::Results,
                &format!("Finding number {i}: spaceflight altered gene expression cluster {i}."),
                2024,
            )
        })
        .collect();

    let pipeline = RagPipeline::builder(Settings::default())
        .corpus(Corpus::from_passages(passages))
        .dictionary(TermDictionary::empty())
        .dense(StaticDense::empty())
        .embedder(Arc::new(HashEmbedder::default()))
        .synthesizer(CannedSynthesizer::new())
        .build()
        .unwrap();

    let outcome = pipeline
        .retrieve("spaceflight gene expression", None)
        .await
        .unwrap();

    assert_eq!(outcome.selection.passages.len(), 5);
    assert!(outcome.selection.cap_relaxed);
    assert_eq!(outcome.selection.distinct_documents, 1);
}

#[tokio::test]
async fn test_dense_outage_degrades_to_lexical_only() {
    let pipeline = RagPipeline::builder(Settings::default())
        .corpus(space_biology_corpus())
        .dictionary(dictionary())
        .dense(Arc::new(FailingDense))
        .embedder(Arc::new(HashEmbedder::default()))
        .synthesizer(CannedSynthesizer::new())
        .build()
        .unwrap();

    let outcome = pipeline
        .retrieve("radiation DNA damage", None)
        .await
        .unwrap();

    assert!(!outcome.selection.passages.is_empty());
    assert_eq!(outcome.selection.passages[0].passage.id, "p-radiation");
    // No dense arm means no similarity signal anywhere
    assert!(outcome
        .selection
        .passages
        .iter()
        .all(|r| r.signals.similarity == 0.0));
}

#[tokio::test]
async fn test_answer_carries_citations_and_metrics() {
    let synthesizer = CannedSynthesizer::new();
    let pipeline = RagPipeline::builder(Settings::default())
        .corpus(space_biology_corpus())
        .dictionary(dictionary())
        .dense(StaticDense::new(vec![
            ("p-weightless", 0.9),
            ("p-radiation", 0.5),
        ]))
        .embedder(Arc::new(HashEmbedder::default()))
        .synthesizer(Arc::clone(&synthesizer) as Arc<dyn Synthesizer>)
        .build()
        .unwrap();

    let answer = pipeline
        .answer("what does microgravity do to bone density")
        .await
        .unwrap();

    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 1);
    assert!(!answer.citations.is_empty());
    assert_eq!(answer.citations[0].index, 1);
    assert_eq!(answer.citations[0].passage_id, "p-weightless");
    assert!(!answer.citations[0].relevance_reason.is_empty());
    assert_eq!(answer.metrics.retrieved_k, answer.citations.len());
    assert!(answer.metrics.grounded_ratio > 0.9);
    assert!(answer.metrics.section_distribution.values().sum::<usize>() > 0);
}

#[tokio::test]
async fn test_empty_corpus_answers_without_synthesis() {
    let synthesizer = CannedSynthesizer::new();
    let pipeline = RagPipeline::builder(Settings::default())
        .corpus(Corpus::empty())
        .dictionary(dictionary())
        .dense(StaticDense::empty())
        .embedder(Arc::new(HashEmbedder::default()))
        .synthesizer(Arc::clone(&synthesizer) as Arc<dyn Synthesizer>)
        .build()
        .unwrap();

    let answer = pipeline.answer("anything at all").await.unwrap();

    assert_eq!(answer.answer, NO_EVIDENCE_ANSWER);
    assert!(answer.citations.is_empty());
    assert_eq!(answer.metrics.retrieved_k, 0);
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retrieval_is_deterministic_across_runs() {
    let build = || {
        RagPipeline::builder(Settings::default())
            .corpus(space_biology_corpus())
            .dictionary(dictionary())
            .dense(StaticDense::new(vec![
                ("p-weightless", 0.8),
                ("p-radiation", 0.8),
                ("p-plants", 0.8),
            ]))
            .embedder(Arc::new(HashEmbedder::default()))
            .synthesizer(CannedSynthesizer::new())
            .build()
            .unwrap()
    };

    let first = build()
        .retrieve("spaceflight biology", None)
        .await
        .unwrap();
    let second = build()
        .retrieve("spaceflight biology", None)
        .await
        .unwrap();

    let ids = |o: &scilit_retrieval::RetrievalOutcome| {
        o.selection
            .passages
            .iter()
            .map(|r| r.passage.id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
}
