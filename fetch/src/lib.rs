//! Ratesync Rate Fetchers
//!
//! Clients for the upstream rate providers and the fan-out plumbing they
//! share. Each provider hides its endpoint, credentials and wire format
//! behind the [`RateFetcher`] capability; upstream failures surface as the
//! classified [`FetchError`] taxonomy, never as raw transport errors.

pub mod error;
pub mod exchangeratesapi;
pub mod factory;
mod fanin;
pub mod fetcher;
pub mod freeconv;

#[cfg(test)]
mod testserver;

pub use error::{FetchError, FetchResult};
pub use exchangeratesapi::{ExchangeRatesApiFetcher, EXCHANGE_RATES_API_URL};
pub use factory::{build_fetcher, FetcherSettings};
pub use fetcher::RateFetcher;
pub use freeconv::{FreeConvConfig, FreeCurrConvFetcher, FREECONV_URL};

#[cfg(any(test, feature = "test-utils"))]
pub use fetcher::MockRateFetcher;
