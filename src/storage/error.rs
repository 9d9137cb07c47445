//! Storage error types

use crate::record::Source;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while reading or appending records
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record at line {line}: {reason}")]
    CorruptRecord { line: u64, reason: String },

    #[error("Record {id} fetched at {fetched_at} is older than the last stored record ({last})")]
    NonMonotonicFetch {
        id: String,
        fetched_at: DateTime<Utc>,
        last: DateTime<Utc>,
    },
}

/// Errors that can occur while maintaining indexes and metadata
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index for {origin} covers {indexed} bytes but the store holds {actual}")]
    Inconsistent {
        origin: Source,
        indexed: u64,
        actual: u64,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for record store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
