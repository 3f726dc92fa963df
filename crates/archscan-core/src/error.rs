//! Error types for the fallible edges of the pipeline.
//!
//! The analysis passes themselves never fail: unparseable fragments become
//! pass warnings. Only loading a corpus from disk, reading configuration and
//! serializing output can return an error.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised outside the analysis passes.
#[derive(Debug, Error)]
pub enum ArchscanError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error while loading a corpus.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The corpus root is missing or not a directory.
    #[error("Invalid corpus root: {0}")]
    InvalidCorpus(String),

    /// Output could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ArchscanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchscanError::Io {
            path: path.into(),
            source,
        }
    }
}
