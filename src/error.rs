//! Error types for index construction and the surrounding I/O

use thiserror::Error;

/// Result type alias for annsearch operations
pub type Result<T> = std::result::Result<T, AnnError>;

/// Errors that can occur while configuring, building or persisting indexes.
///
/// Queries never produce these: `search` absorbs anomalies into an empty
/// result so one bad query cannot abort a concurrent batch.
#[derive(Error, Debug)]
pub enum AnnError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl AnnError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        AnnError::InvalidConfig(reason.into())
    }
}
