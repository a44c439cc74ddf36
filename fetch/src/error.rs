//! Fetch error taxonomy.

use thiserror::Error;

/// Errors surfaced by rate fetchers.
///
/// Upstream failures are classified here instead of leaking transport
/// details; the first error encountered in a fan-out wins and no partial
/// results are exposed alongside it.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The upstream rejected the call for a missing or invalid credential.
    #[error("unauthorized, API key is missing or rejected")]
    Unauthorized,

    /// The local pre-flight budget check failed; no network I/O was issued.
    #[error("request budget exceeded: {requests_needed} requests needed, {max_per_hour} allowed per hour")]
    BudgetExceeded {
        requests_needed: usize,
        max_per_hour: usize,
    },

    /// The upstream reported its own rate limit.
    #[error("upstream API limit reached")]
    RateLimitReached,

    /// A 4xx response.
    #[error("client error (status {status}): {message}")]
    ClientError { status: u16, message: String },

    /// A 5xx response.
    #[error("server error (status {status})")]
    ServerError { status: u16 },

    /// A status outside the classified ranges.
    #[error("unexpected upstream status {status}")]
    UnknownStatus { status: u16 },

    /// The body could not be decoded into the provider's wire format.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// The request never produced a classifiable response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;
