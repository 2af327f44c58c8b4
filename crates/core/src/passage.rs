//! Passage data model
//!
//! A passage is the unit of retrievable text: one chunk of one scientific
//! document, created at ingestion time and read-only inside the pipeline.

use serde::{Deserialize, Serialize};

/// Section label vocabulary for scientific documents.
///
/// Labels outside the fixed vocabulary deserialize to `Unknown` rather than
/// failing the whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Abstract,
    Introduction,
    Methods,
    Results,
    Discussion,
    Conclusion,
    References,
    Appendix,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Section {
    /// Parse a free-form section label from ingestion metadata.
    ///
    /// Matches case-insensitively and tolerates common long forms
    /// ("materials and methods", "supplementary").
    pub fn parse(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "abstract" => Self::Abstract,
            "introduction" | "background" => Self::Introduction,
            "methods" | "materials and methods" => Self::Methods,
            "results" => Self::Results,
            "discussion" => Self::Discussion,
            "conclusion" | "conclusions" => Self::Conclusion,
            "references" | "bibliography" => Self::References,
            "appendix" | "supplementary" => Self::Appendix,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abstract => "abstract",
            Self::Introduction => "introduction",
            Self::Methods => "methods",
            Self::Results => "results",
            Self::Discussion => "discussion",
            Self::Conclusion => "conclusion",
            Self::References => "references",
            Self::Appendix => "appendix",
            Self::Unknown => "unknown",
        }
    }
}

/// An immutable unit of retrievable text.
///
/// The embedding vector lives in the dense index and is referenced by `id`;
/// passages never carry vectors themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Unique passage identifier (shared between the lexical and dense index)
    pub id: String,
    /// Owning document identifier
    pub document_id: String,
    /// Section label
    #[serde(default)]
    pub section: Section,
    /// Raw passage text
    pub text: String,
    /// Source domain/URL, when known
    #[serde(default)]
    pub source_url: Option<String>,
    /// Publication year, when known
    #[serde(default)]
    pub year: Option<i32>,
}

impl Passage {
    /// Character length of the passage text.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
