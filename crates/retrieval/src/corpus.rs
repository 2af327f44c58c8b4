//! Passage corpus
//!
//! An in-memory snapshot of the passage collection, loaded from a JSON or
//! YAML file. Retrieval arms return passage ids; the corpus joins them
//! back to full passages. An empty corpus is a valid state: the pipeline
//! simply finds nothing.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use scilit_core::Passage;

use crate::RetrievalError;

pub struct Corpus {
    passages: Vec<Arc<Passage>>,
    by_id: HashMap<String, Arc<Passage>>,
}

impl Corpus {
    pub fn empty() -> Self {
        Self {
            passages: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Build from owned passages. Later duplicates of an id are dropped
    /// with a warning; ids must be unique for retrieval joins to be
    /// well defined.
    pub fn from_passages(passages: Vec<Passage>) -> Self {
        let mut unique: Vec<Arc<Passage>> = Vec::with_capacity(passages.len());
        let mut by_id: HashMap<String, Arc<Passage>> = HashMap::with_capacity(passages.len());

        for passage in passages {
            if by_id.contains_key(&passage.id) {
                warn!(id = %passage.id, "duplicate passage id in corpus, keeping first");
                continue;
            }
            let passage = Arc::new(passage);
            by_id.insert(passage.id.clone(), Arc::clone(&passage));
            unique.push(passage);
        }

        Self {
            passages: unique,
            by_id,
        }
    }

    /// Load a snapshot file; format chosen by extension (`.yaml`/`.yml`
    /// parse as YAML, anything else as JSON).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RetrievalError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            RetrievalError::Index(format!("failed to read corpus {}: {e}", path.display()))
        })?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        let passages: Vec<Passage> = if is_yaml {
            serde_yaml::from_str(&raw).map_err(|e| {
                RetrievalError::Index(format!("malformed corpus {}: {e}", path.display()))
            })?
        } else {
            serde_json::from_str(&raw).map_err(|e| {
                RetrievalError::Index(format!("malformed corpus {}: {e}", path.display()))
            })?
        };

        info!(passages = passages.len(), path = %path.display(), "loaded corpus snapshot");
        Ok(Self::from_passages(passages))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Passage>> {
        self.by_id.get(id)
    }

    pub fn passages(&self) -> &[Arc<Passage>] {
        &self.passages
    }

    /// Owned clones, for building the lexical index.
    pub fn to_vec(&self) -> Vec<Passage> {
        self.passages.iter().map(|p| (**p).clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scilit_core::Section;

    fn passage(id: &str) -> Passage {
        Passage {
            id: id.to_string(),
            document_id: "doc".to_string(),
            section: Section::Results,
            text: "text".to_string(),
            source_url: None,
            year: None,
        }
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let corpus = Corpus::from_passages(vec![passage("a"), passage("a"), passage("b")]);
        assert_eq!(corpus.len(), 2);
        assert!(corpus.get("a").is_some());
    }

    #[test]
    fn test_load_json_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passages.json");
        std::fs::write(
            &path,
            r#"[{"id": "p1", "document_id": "d1", "section": "results",
                 "text": "Bone density decreased.", "source_url": null, "year": 2021}]"#,
        )
        .unwrap();

        let corpus = Corpus::load(&path).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.get("p1").unwrap().year, Some(2021));
    }

    #[test]
    fn test_load_yaml_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passages.yaml");
        std::fs::write(
            &path,
            "- id: p1\n  document_id: d1\n  section: abstract\n  text: Overview.\n",
        )
        .unwrap();

        let corpus = Corpus::load(&path).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.get("p1").unwrap().section, Section::Abstract);
    }

    #[test]
    fn test_malformed_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passages.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Corpus::load(&path).is_err());
    }

    #[test]
    fn test_empty_corpus_is_valid() {
        let corpus = Corpus::empty();
        assert!(corpus.is_empty());
        assert!(corpus.get("missing").is_none());
    }
}
