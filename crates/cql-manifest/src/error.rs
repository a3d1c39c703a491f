//! Error types for dependency extraction and manifest assembly.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur during extraction or manifest persistence.
///
/// Only true syntax errors from the parser propagate out of extraction;
/// constructs the extractor does not recognize are diagnosed and skipped,
/// never raised.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// CQL syntax error from the cql-tree parser.
    #[error("CQL syntax error: {0}")]
    Syntax(#[from] cql_tree::CqlSyntaxError),

    /// I/O error while persisting or loading a manifest.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Manifest serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Manifest deserialization failure.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl ManifestError {
    pub(crate) fn io_error(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for extraction and assembly operations.
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;
