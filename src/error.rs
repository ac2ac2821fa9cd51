//! Error types for record reads and batched writes.

use crate::database::{BoxError, DataSourceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordSetError {
    /// Malformed input caught before any I/O
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Read-path failure; the result cursor has already been released
    #[error("Query execution error for '{query}': {source}")]
    QueryExecutionError {
        query: String,
        #[source]
        source: DataSourceError,
    },

    /// The caller's decoder rejected a row
    #[error("Failed to decode row {row_index}: {source}")]
    DecodeError {
        row_index: usize,
        #[source]
        source: BoxError,
    },

    /// Two decoded records produced the same key in a unique mapping
    #[error("Duplicate key {key} while building record map")]
    DuplicateKeyError { key: String },

    /// Failure of the single-batch (non-concurrent) write path
    #[error("Write error: {source}")]
    WriteError {
        #[source]
        source: BoxError,
    },

    /// At least one concurrently executed batch failed
    #[error(
        "{failed_batches} batch writer(s) failed to write records \
         ({rows_affected} rows written by successful batches, {pending_batches} still pending)"
    )]
    BatchWriteFailure {
        failed_batches: usize,
        rows_affected: u64,
        pending_batches: usize,
    },

    /// The write deadline elapsed before every batch reported back
    #[error(
        "{pending_batches} batch writer(s) were still running when the write deadline elapsed \
         ({rows_affected} rows written so far)"
    )]
    WriteIncomplete {
        pending_batches: usize,
        rows_affected: u64,
    },

    #[error("Connection error: {0}")]
    ConnectionError(#[source] DataSourceError),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl RecordSetError {
    /// True when some rows may already be durably written despite the error
    pub fn may_have_partial_writes(&self) -> bool {
        match self {
            RecordSetError::BatchWriteFailure { .. } | RecordSetError::WriteIncomplete { .. } => {
                true
            }
            _ => false,
        }
    }
}

impl From<config::ConfigError> for RecordSetError {
    fn from(error: config::ConfigError) -> Self {
        RecordSetError::ConfigurationError(error.to_string())
    }
}

pub type RecordSetResult<T> = std::result::Result<T, RecordSetError>;
