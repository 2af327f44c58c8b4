//! Main settings module
//!
//! Settings load from an optional YAML/TOML file plus `SCILIT_`-prefixed
//! environment variables, with defaults from [`crate::constants`].

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{endpoints, retrieval, timeouts, weights};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Retrieval and reranking configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Dense vector store connection
    #[serde(default)]
    pub dense_store: DenseStoreConfig,

    /// Synthesis (LLM) client configuration
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Corpus snapshot locations
    #[serde(default)]
    pub corpus: CorpusConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retrieval.validate()?;

        if self.dense_store.vector_dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dense_store.vector_dim".to_string(),
                message: "vector dimension must be positive".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from a file (if present) and environment variables.
pub fn load_settings(config_path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(File::from(path));
    }

    builder = builder.add_source(Environment::with_prefix("SCILIT").separator("__"));

    let settings: Settings = builder
        .build()
        .map_err(ConfigError::from)?
        .try_deserialize()
        .map_err(ConfigError::from)?;

    settings.validate()?;
    Ok(settings)
}

/// Retrieval pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Top-K results from dense (embedding) search
    #[serde(default = "default_dense_top_k")]
    pub dense_top_k: usize,

    /// Top-K results from lexical (BM25) search
    #[serde(default = "default_lexical_top_k")]
    pub lexical_top_k: usize,

    /// RRF damping constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Candidate list size after fusion
    #[serde(default = "default_fused_top_k")]
    pub fused_top_k: usize,

    /// Final passages handed to synthesis
    #[serde(default = "default_synthesis_limit")]
    pub synthesis_limit: usize,

    /// Per-document cap in the diversity selector
    #[serde(default = "default_max_per_document")]
    pub max_per_document: usize,

    /// Best-effort distinct-document target
    #[serde(default = "default_min_documents")]
    pub min_documents: usize,

    /// Near-duplicate Jaccard threshold
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f32,

    /// Target character-length band for the length-fit signal
    #[serde(default = "default_min_passage_chars")]
    pub min_passage_chars: usize,
    #[serde(default = "default_max_passage_chars")]
    pub max_passage_chars: usize,

    /// Character budget for the synthesis context
    #[serde(default = "default_context_max_chars")]
    pub context_max_chars: usize,

    /// Per-arm retrieval timeout in milliseconds
    #[serde(default = "default_retrieval_timeout_ms")]
    pub retrieval_timeout_ms: u64,

    /// Reranker signal weights
    #[serde(default)]
    pub weights: SignalWeights,
}

fn default_dense_top_k() -> usize {
    retrieval::DENSE_TOP_K
}
fn default_lexical_top_k() -> usize {
    retrieval::LEXICAL_TOP_K
}
fn default_rrf_k() -> f32 {
    retrieval::RRF_K
}
fn default_fused_top_k() -> usize {
    retrieval::FUSED_TOP_K
}
fn default_synthesis_limit() -> usize {
    retrieval::SYNTHESIS_LIMIT
}
fn default_max_per_document() -> usize {
    retrieval::MAX_PER_DOCUMENT
}
fn default_min_documents() -> usize {
    retrieval::MIN_DOCUMENTS
}
fn default_duplicate_threshold() -> f32 {
    retrieval::DUPLICATE_JACCARD
}
fn default_min_passage_chars() -> usize {
    retrieval::MIN_PASSAGE_CHARS
}
fn default_max_passage_chars() -> usize {
    retrieval::MAX_PASSAGE_CHARS
}
fn default_context_max_chars() -> usize {
    retrieval::CONTEXT_MAX_CHARS
}
fn default_retrieval_timeout_ms() -> u64 {
    timeouts::RETRIEVAL_MS
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dense_top_k: default_dense_top_k(),
            lexical_top_k: default_lexical_top_k(),
            rrf_k: default_rrf_k(),
            fused_top_k: default_fused_top_k(),
            synthesis_limit: default_synthesis_limit(),
            max_per_document: default_max_per_document(),
            min_documents: default_min_documents(),
            duplicate_threshold: default_duplicate_threshold(),
            min_passage_chars: default_min_passage_chars(),
            max_passage_chars: default_max_passage_chars(),
            context_max_chars: default_context_max_chars(),
            retrieval_timeout_ms: default_retrieval_timeout_ms(),
            weights: SignalWeights::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;

        if self.rrf_k <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.rrf_k".to_string(),
                message: "RRF constant must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.duplicate_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.duplicate_threshold".to_string(),
                message: "threshold must be in [0, 1]".to_string(),
            });
        }
        if self.max_per_document == 0 || self.synthesis_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.max_per_document/synthesis_limit".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.min_passage_chars >= self.max_passage_chars {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.min_passage_chars".to_string(),
                message: "length band must be non-empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Reranker signal weights.
///
/// The seven positive weights must sum to 1.0 (within a small tolerance) so
/// the pre-penalty final score stays interpretable as a weighted average.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalWeights {
    #[serde(default = "default_w_similarity")]
    pub similarity: f32,
    #[serde(default = "default_w_lexical")]
    pub lexical: f32,
    #[serde(default = "default_w_keyword_overlap")]
    pub keyword_overlap: f32,
    #[serde(default = "default_w_section_boost")]
    pub section_boost: f32,
    #[serde(default = "default_w_recency")]
    pub recency: f32,
    #[serde(default = "default_w_authority")]
    pub authority: f32,
    #[serde(default = "default_w_length_fit")]
    pub length_fit: f32,
    /// Subtracted, not part of the 1.0 budget
    #[serde(default = "default_w_duplicate_penalty")]
    pub duplicate_penalty: f32,
}

fn default_w_similarity() -> f32 {
    weights::SIMILARITY
}
fn default_w_lexical() -> f32 {
    weights::LEXICAL
}
fn default_w_keyword_overlap() -> f32 {
    weights::KEYWORD_OVERLAP
}
fn default_w_section_boost() -> f32 {
    weights::SECTION_BOOST
}
fn default_w_recency() -> f32 {
    weights::RECENCY
}
fn default_w_authority() -> f32 {
    weights::AUTHORITY
}
fn default_w_length_fit() -> f32 {
    weights::LENGTH_FIT
}
fn default_w_duplicate_penalty() -> f32 {
    weights::DUPLICATE_PENALTY
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            similarity: default_w_similarity(),
            lexical: default_w_lexical(),
            keyword_overlap: default_w_keyword_overlap(),
            section_boost: default_w_section_boost(),
            recency: default_w_recency(),
            authority: default_w_authority(),
            length_fit: default_w_length_fit(),
            duplicate_penalty: default_w_duplicate_penalty(),
        }
    }
}

impl SignalWeights {
    /// Sum of the positive weights (excludes the penalty term).
    pub fn positive_sum(&self) -> f32 {
        self.similarity
            + self.lexical
            + self.keyword_overlap
            + self.section_boost
            + self.recency
            + self.authority
            + self.length_fit
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.positive_sum();
        if (sum - 1.0).abs() > 1e-3 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.weights".to_string(),
                message: format!("positive weights must sum to 1.0, got {sum:.4}"),
            });
        }
        if self.duplicate_penalty < 0.0 || self.duplicate_penalty > 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.weights.duplicate_penalty".to_string(),
                message: "penalty weight must be in [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

/// Dense vector store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseStoreConfig {
    /// Qdrant endpoint URL
    #[serde(default = "default_qdrant_endpoint")]
    pub endpoint: String,

    /// Collection name
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Embedding dimension (1536 for text-embedding-3-small)
    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,

    /// API key (optional, for cloud deployments)
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_collection() -> String {
    "scilit_passages".to_string()
}
fn default_vector_dim() -> usize {
    1536
}

impl Default for DenseStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_qdrant_endpoint(),
            collection: default_collection(),
            vector_dim: default_vector_dim(),
            api_key: None,
        }
    }
}

/// Synthesis (LLM) client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_synthesis_endpoint")]
    pub endpoint: String,

    /// Chat model name
    #[serde(default = "default_synthesis_model")]
    pub model: String,

    /// API key; usually supplied via SCILIT__SYNTHESIS__API_KEY
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_synthesis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_synthesis_endpoint() -> String {
    endpoints::OPENAI_DEFAULT.to_string()
}
fn default_synthesis_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> usize {
    700
}
fn default_synthesis_timeout_ms() -> u64 {
    timeouts::SYNTHESIS_MS
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_synthesis_endpoint(),
            model: default_synthesis_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_synthesis_timeout_ms(),
        }
    }
}

/// Corpus snapshot locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Passage snapshot file (JSON or YAML)
    #[serde(default = "default_passages_path")]
    pub passages_path: String,

    /// Term-expansion dictionary file (JSON)
    #[serde(default = "default_dictionary_path")]
    pub dictionary_path: String,
}

fn default_passages_path() -> String {
    "data/passages.json".to_string()
}
fn default_dictionary_path() -> String {
    "data/term_dictionary.json".to_string()
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            passages_path: default_passages_path(),
            dictionary_path: default_dictionary_path(),
        }
    }
}
