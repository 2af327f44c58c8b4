//! Lexical BM25 retrieval using Tantivy
//!
//! The keyword arm of hybrid retrieval. An in-RAM index over passage text
//! is queried with the full expanded term set as a disjunction, so any
//! passage containing at least one query or expansion term is a candidate
//! and BM25 does the ranking.

use parking_lot::RwLock;
use tantivy::{
    collector::TopDocs,
    query::{BooleanQuery, Occur, Query, TermQuery},
    schema::{
        Field, IndexRecordOption, OwnedValue, Schema, TextFieldIndexing, TextOptions, STORED,
        STRING,
    },
    tokenizer::{LowerCaser, RemoveLongFilter, TextAnalyzer},
    Index, IndexReader, IndexWriter, TantivyDocument, Term,
};
use tracing::debug;

use scilit_core::Passage;

use crate::tokenize::ScientificTokenizer;
use crate::RetrievalError;

const TOKENIZER_NAME: &str = "scientific";

/// Lexical retrieval configuration.
#[derive(Debug, Clone)]
pub struct LexicalConfig {
    /// Number of results to retrieve
    pub top_k: usize,
    /// Index writer buffer in bytes
    pub writer_heap_bytes: usize,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            top_k: 25,
            writer_heap_bytes: 50_000_000,
        }
    }
}

/// A BM25 hit: passage id plus raw score.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub id: String,
    pub score: f32,
}

/// In-RAM BM25 index over passage text.
pub struct LexicalIndex {
    index: Index,
    reader: IndexReader,
    writer: RwLock<Option<IndexWriter>>,
    id_field: Field,
    text_field: Field,
    config: LexicalConfig,
}

impl LexicalIndex {
    pub fn new(config: LexicalConfig) -> Result<Self, RetrievalError> {
        let mut schema_builder = Schema::builder();

        let text_options = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(TOKENIZER_NAME)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );

        let id_field = schema_builder.add_text_field("id", STRING | STORED);
        let text_field = schema_builder.add_text_field("text", text_options);

        let schema = schema_builder.build();
        let index = Index::create_in_ram(schema);

        let analyzer = TextAnalyzer::builder(ScientificTokenizer::default())
            .filter(RemoveLongFilter::limit(64))
            .filter(LowerCaser)
            .build();
        index.tokenizers().register(TOKENIZER_NAME, analyzer);

        let reader = index
            .reader()
            .map_err(|e| RetrievalError::Index(e.to_string()))?;
        let writer = index
            .writer(config.writer_heap_bytes)
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            writer: RwLock::new(Some(writer)),
            id_field,
            text_field,
            config,
        })
    }

    /// Build an index over a full passage set.
    pub fn build(passages: &[Passage], config: LexicalConfig) -> Result<Self, RetrievalError> {
        let index = Self::new(config)?;
        index.index_passages(passages)?;
        Ok(index)
    }

    pub fn index_passages(&self, passages: &[Passage]) -> Result<(), RetrievalError> {
        let mut writer = self.writer.write();
        let writer = writer
            .as_mut()
            .ok_or_else(|| RetrievalError::Index("writer not available".to_string()))?;

        for passage in passages {
            let mut doc = TantivyDocument::default();
            doc.add_text(self.id_field, &passage.id);
            doc.add_text(self.text_field, &passage.text);
            writer
                .add_document(doc)
                .map_err(|e| RetrievalError::Index(e.to_string()))?;
        }

        writer
            .commit()
            .map_err(|e| RetrievalError::Index(e.to_string()))?;
        self.reader
            .reload()
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        debug!(passages = passages.len(), "indexed passages for BM25");
        Ok(())
    }

    /// Search with a term disjunction. Ties are broken by passage id so the
    /// same index and query always return the same order.
    pub fn search_terms(
        &self,
        terms: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<LexicalHit>, RetrievalError> {
        let k = top_k.unwrap_or(self.config.top_k);
        if terms.is_empty() || k == 0 || self.doc_count() == 0 {
            return Ok(Vec::new());
        }

        let clauses: Vec<(Occur, Box<dyn Query>)> = terms
            .iter()
            .map(|term| {
                let term = Term::from_field_text(self.text_field, &term.to_lowercase());
                let query: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        // Over-fetch so ties at the boundary resolve deterministically.
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(k.saturating_mul(2)))
            .map_err(|e| RetrievalError::Search(e.to_string()))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| RetrievalError::Search(e.to_string()))?;
            let id = doc
                .get_first(self.id_field)
                .and_then(|v| match v {
                    OwnedValue::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .unwrap_or("")
                .to_string();
            hits.push(LexicalHit { id, score });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scilit_core::Section;

    fn passage(id: &str, text: &str) -> Passage {
        Passage {
            id: id.to_string(),
            document_id: format!("doc-{id}"),
            section: Section::Results,
            text: text.to_string(),
            source_url: None,
            year: Some(2022),
        }
    }

    #[test]
    fn test_empty_index_returns_no_hits() {
        let index = LexicalIndex::new(LexicalConfig::default()).unwrap();
        assert_eq!(index.doc_count(), 0);
        let hits = index
            .search_terms(&["microgravity".to_string()], None)
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_term_disjunction_ranks_by_bm25() {
        let passages = vec![
            passage("p1", "Microgravity induced bone density loss in murine models"),
            passage("p2", "Radiation exposure and DNA repair mechanisms"),
            passage("p3", "Bone remodeling under simulated microgravity microgravity"),
        ];
        let index = LexicalIndex::build(&passages, LexicalConfig::default()).unwrap();
        assert_eq!(index.doc_count(), 3);

        let hits = index
            .search_terms(&["microgravity".to_string(), "bone".to_string()], Some(10))
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.id != "p2"));
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_hyphenated_identifier_is_searchable() {
        let passages = vec![
            passage("p1", "RNA-seq profiling of GLDS-242 flight samples"),
            passage("p2", "Proteomic analysis of ground controls"),
        ];
        let index = LexicalIndex::build(&passages, LexicalConfig::default()).unwrap();

        let hits = index.search_terms(&["glds-242".to_string()], None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p1");
    }

    #[test]
    fn test_empty_terms_short_circuit() {
        let passages = vec![passage("p1", "anything at all")];
        let index = LexicalIndex::build(&passages, LexicalConfig::default()).unwrap();
        assert!(index.search_terms(&[], None).unwrap().is_empty());
    }
}
