//! Error types for CQL parsing.

use thiserror::Error;

/// Errors that can occur while parsing a CQL document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CqlSyntaxError {
    /// Parse error at a specific position in the input.
    #[error("syntax error at position {position}: {message}")]
    ParseError {
        /// Byte offset in the input where the error occurred.
        position: usize,
        /// Description of the error.
        message: String,
    },

    /// The document ended before a construct was complete.
    #[error("document is incomplete: {0}")]
    Incomplete(String),

    /// Empty input provided.
    #[error("empty CQL document")]
    EmptyDocument,
}

/// Result type for parse operations.
pub type TreeResult<T> = std::result::Result<T, CqlSyntaxError>;
