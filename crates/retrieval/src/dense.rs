//! Dense retrieval
//!
//! The semantic arm of hybrid retrieval. The pipeline depends only on the
//! [`DenseRetriever`] trait; [`QdrantDenseRetriever`] is the production
//! implementation backed by a Qdrant collection of embedded passages.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        condition::ConditionOneOf, Condition, CreateCollectionBuilder, Distance, FieldCondition,
        Filter, Match, PointStruct, Range, SearchPointsBuilder, UpsertPointsBuilder,
        VectorParamsBuilder,
    },
    Qdrant,
};
use tracing::info;

use scilit_config::DenseStoreConfig;
use scilit_core::{Passage, Section};

use crate::RetrievalError;

/// A dense hit: passage id plus similarity in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct DenseHit {
    pub id: String,
    pub similarity: f32,
}

/// Optional metadata constraints applied inside the vector store.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub section: Option<Section>,
    pub year_range: Option<(i32, i32)>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(mut self, section: Section) -> Self {
        self.section = Some(section);
        self
    }

    pub fn years(mut self, from: i32, to: i32) -> Self {
        self.year_range = Some((from, to));
        self
    }

    fn into_qdrant(self) -> Filter {
        let mut conditions = Vec::new();

        if let Some(section) = self.section {
            conditions.push(Condition {
                condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                    key: "section".to_string(),
                    r#match: Some(Match {
                        match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                            section.as_str().to_string(),
                        )),
                    }),
                    ..Default::default()
                })),
            });
        }

        if let Some((from, to)) = self.year_range {
            conditions.push(Condition {
                condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                    key: "year".to_string(),
                    range: Some(Range {
                        gte: Some(from as f64),
                        lte: Some(to as f64),
                        ..Default::default()
                    }),
                    ..Default::default()
                })),
            });
        }

        Filter {
            must: conditions,
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.section.is_none() && self.year_range.is_none()
    }
}

/// Nearest-neighbor search over embedded passages.
#[async_trait]
pub trait DenseRetriever: Send + Sync {
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<DenseHit>, RetrievalError>;
}

/// Qdrant-backed dense retriever.
pub struct QdrantDenseRetriever {
    client: Qdrant,
    config: DenseStoreConfig,
}

impl QdrantDenseRetriever {
    pub fn new(config: DenseStoreConfig) -> Result<Self, RetrievalError> {
        let mut builder = Qdrant::from_url(&config.endpoint);
        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder.build().map_err(|e| {
            RetrievalError::UpstreamUnavailable {
                source_name: "dense",
                message: e.to_string(),
            }
        })?;
        Ok(Self { client, config })
    }

    /// Create the collection if it does not exist.
    pub async fn ensure_collection(&self) -> Result<(), RetrievalError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(Self::upstream)?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.config.collection).vectors_config(
                        VectorParamsBuilder::new(self.config.vector_dim as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(Self::upstream)?;
            info!(collection = %self.config.collection, "created dense collection");
        }

        Ok(())
    }

    /// Upsert passages with their embeddings. Metadata lands in the payload
    /// so filters can be applied server side.
    pub async fn upsert(
        &self,
        passages: &[Passage],
        embeddings: &[Vec<f32>],
    ) -> Result<(), RetrievalError> {
        if passages.len() != embeddings.len() {
            return Err(RetrievalError::Index(
                "passage and embedding count mismatch".to_string(),
            ));
        }

        let points: Vec<PointStruct> = passages
            .iter()
            .zip(embeddings.iter())
            .map(|(passage, emb)| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("document_id".to_string(), passage.document_id.clone().into());
                payload.insert(
                    "section".to_string(),
                    passage.section.as_str().to_string().into(),
                );
                if let Some(year) = passage.year {
                    payload.insert("year".to_string(), (year as i64).into());
                }
                if let Some(ref url) = passage.source_url {
                    payload.insert("source_url".to_string(), url.clone().into());
                }
                PointStruct::new(passage.id.clone(), emb.clone(), payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points))
            .await
            .map_err(Self::upstream)?;

        Ok(())
    }

    fn upstream(e: qdrant_client::QdrantError) -> RetrievalError {
        RetrievalError::UpstreamUnavailable {
            source_name: "dense",
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl DenseRetriever for QdrantDenseRetriever {
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<DenseHit>, RetrievalError> {
        let mut builder = SearchPointsBuilder::new(
            &self.config.collection,
            query_vector.to_vec(),
            top_k as u64,
        );

        if let Some(f) = filter.filter(|f| !f.is_empty()) {
            builder = builder.filter(f.clone().into_qdrant());
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(Self::upstream)?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .map(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            n.to_string()
                        }
                        None => String::new(),
                    })
                    .unwrap_or_default();
                DenseHit {
                    id,
                    // Cosine scores may drift slightly out of range
                    similarity: point.score.clamp(0.0, 1.0),
                }
            })
            .collect())
    }
}
