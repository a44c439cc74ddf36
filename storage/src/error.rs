//! Storage error taxonomy.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A pluggable ID generator produced something other than the 16 bytes
    /// a UUID needs.
    #[error("id generator must return exactly 16 bytes, got {got}")]
    NotEnoughIdBytes { got: usize },

    /// A range query was asked for a window that ends before it starts.
    #[error("invalid time range: start {start} is after end {end}")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The underlying database rejected an operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row no longer decodes into a rate record.
    #[error("stored record is corrupt: {0}")]
    CorruptRecord(String),

    /// A backend name from configuration matched nothing.
    #[error("value {0:?} is not a valid storage backend")]
    UnknownBackend(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
