//! Service error taxonomy.

use ratesync_common::PairParseError;
use ratesync_fetch::FetchError;
use ratesync_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the save and conversion services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Conversion was attempted with zero configured backends.
    #[error("no storage backends configured")]
    NoStorageConfigured,

    /// The lookup window held no matching rate (distinct from a transport
    /// or database failure).
    #[error("rate for the currency pair is not found in storage")]
    RateNotFound,

    /// The caller's deadline elapsed before any backend answered.
    #[error("conversion deadline elapsed before any backend answered")]
    Timeout,

    /// Amount or stored rate is NaN or infinite.
    #[error("amount is not a finite number")]
    NonFiniteAmount,

    #[error(transparent)]
    InvalidPair(#[from] PairParseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
