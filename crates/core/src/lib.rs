//! Core data model for the scilit retrieval service
//!
//! Holds the types shared across crates:
//! - Passage and its section vocabulary
//! - Answer-facing types (citations, retrieval metrics)
//! - The workspace-level error type

pub mod answer;
pub mod passage;

pub use answer::{Citation, RagAnswer, RetrievalMetrics};
pub use passage::{Passage, Section};

use thiserror::Error;

/// Workspace-level error
#[derive(Error, Debug)]
pub enum Error {
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus error: {0}")]
    Corpus(String),
}
