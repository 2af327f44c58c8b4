//! Configuration management for the scilit retrieval service
//!
//! Supports loading configuration from:
//! - YAML/TOML files
//! - Environment variables (SCILIT__ prefix, `__` as separator)
//! - Defaults in [`constants`]

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, CorpusConfig, DenseStoreConfig, RetrievalConfig, Settings, SignalWeights,
    SynthesisConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
