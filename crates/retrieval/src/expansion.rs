//! Query term expansion
//!
//! A curated dictionary maps domain concepts to their synonyms and
//! abbreviations ("microgravity" -> "weightlessness", "spaceflight", ...).
//! Expanding the query before retrieval lets a query phrased with one
//! surface form reach passages phrased with another.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::tokenize::{token_set, tokenize};
use crate::RetrievalError;

/// Source of dictionary entries: concept key -> variant terms.
pub trait DictionarySource: Send + Sync {
    fn load(&self) -> Result<BTreeMap<String, BTreeSet<String>>, RetrievalError>;
}

/// Loads a dictionary from a JSON object of `{"key": ["variant", ...]}`.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DictionarySource for JsonFileSource {
    fn load(&self) -> Result<BTreeMap<String, BTreeSet<String>>, RetrievalError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            RetrievalError::Index(format!(
                "failed to read dictionary {}: {e}",
                self.path.display()
            ))
        })?;
        let entries: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw).map_err(|e| {
            RetrievalError::Index(format!(
                "malformed dictionary {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(entries
            .into_iter()
            .map(|(key, variants)| {
                let key = key.trim().to_lowercase();
                let variants = variants
                    .into_iter()
                    .map(|v| v.trim().to_lowercase())
                    .filter(|v| !v.is_empty())
                    .collect();
                (key, variants)
            })
            .filter(|(key, _)| !key.is_empty())
            .collect())
    }
}

/// A query together with the terms added by expansion.
#[derive(Debug, Clone)]
pub struct ExpandedQuery {
    /// Query as the caller submitted it.
    pub original: String,
    /// Dictionary keys that fired on this query.
    pub matched_keys: BTreeSet<String>,
    /// Full lowercase term set: query tokens plus expansion terms.
    pub terms: BTreeSet<String>,
    /// Original text followed by the added terms, for dense embedding.
    pub expanded_text: String,
}

impl ExpandedQuery {
    pub fn terms_vec(&self) -> Vec<String> {
        self.terms.iter().cloned().collect()
    }
}

/// In-memory expansion dictionary.
///
/// An entry fires when its key or any of its variants occurs in the query:
/// single-word triggers match whole tokens, multi-word triggers match as
/// substrings. Variants triggering their own entry makes expansion
/// idempotent: expanding an already expanded query adds nothing new.
pub struct TermDictionary {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl TermDictionary {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn from_entries(entries: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { entries }
    }

    /// Load from a source, degrading to an empty dictionary on failure.
    /// Retrieval proceeds unexpanded rather than failing the whole query.
    pub fn from_source(source: &dyn DictionarySource) -> Self {
        match source.load() {
            Ok(entries) => {
                debug!(entries = entries.len(), "loaded expansion dictionary");
                Self { entries }
            }
            Err(e) => {
                warn!(error = %e, "expansion dictionary unavailable, continuing without expansion");
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn expand(&self, query: &str) -> ExpandedQuery {
        let lower = query.to_lowercase();
        let query_tokens = token_set(query);

        let mut matched_keys = BTreeSet::new();
        let mut terms: BTreeSet<String> = query_tokens.iter().cloned().collect();
        let mut added: BTreeSet<String> = BTreeSet::new();

        for (key, variants) in &self.entries {
            let fired = std::iter::once(key.as_str())
                .chain(variants.iter().map(String::as_str))
                .any(|trigger| {
                    if trigger.contains(char::is_whitespace) {
                        lower.contains(trigger)
                    } else {
                        query_tokens.contains(trigger)
                    }
                });
            if !fired {
                continue;
            }
            matched_keys.insert(key.clone());
            for term in variants.iter().chain(std::iter::once(key)) {
                for token in tokenize(term) {
                    if terms.insert(token.clone()) {
                        added.insert(token);
                    }
                }
            }
        }

        let expanded_text = if added.is_empty() {
            query.to_string()
        } else {
            let mut text = query.to_string();
            for term in &added {
                text.push(' ');
                text.push_str(term);
            }
            text
        };

        ExpandedQuery {
            original: query.to_string(),
            matched_keys,
            terms,
            expanded_text,
        }
    }
}
