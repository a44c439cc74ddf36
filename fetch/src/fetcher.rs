//! Rate fetcher trait and test double.

use async_trait::async_trait;
use ratesync_common::{CurrencyPair, RateRecord};

use crate::error::FetchResult;

/// Trait for rate providers.
///
/// An implementation turns a batch of currency pairs into rate records,
/// encapsulating the upstream URL, credentials and wire decoding. Fetchers
/// never retry internally; retry policy belongs to the caller.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    /// Fetch rates for the given pairs.
    ///
    /// An empty batch returns an empty result without touching the network.
    /// Whether duplicate pairs collapse is provider-defined.
    async fn fetch(&self, pairs: &[CurrencyPair]) -> FetchResult<Vec<RateRecord>>;
}

/// Mock fetcher for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateFetcher {
    provider: ratesync_common::RateProvider,
    rates: dashmap::DashMap<String, f32>,
    fail_unauthorized: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateFetcher {
    /// Create a new mock tagged with the given provider.
    pub fn new(provider: ratesync_common::RateProvider) -> Self {
        Self {
            provider,
            rates: dashmap::DashMap::new(),
            fail_unauthorized: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Set the rate returned for a pair key.
    pub fn set_rate(&self, key: &str, rate: f32) {
        self.rates.insert(key.to_string(), rate);
    }

    /// Make every subsequent fetch fail with `Unauthorized`.
    pub fn fail_unauthorized(&self) {
        self.fail_unauthorized
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateFetcher for MockRateFetcher {
    async fn fetch(&self, pairs: &[CurrencyPair]) -> FetchResult<Vec<RateRecord>> {
        if self.fail_unauthorized.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::error::FetchError::Unauthorized);
        }

        let fetched_at = chrono::Utc::now();
        Ok(pairs
            .iter()
            .filter_map(|pair| {
                self.rates.get(&pair.storage_key()).map(|rate| {
                    RateRecord::new(pair, self.provider, *rate, fetched_at)
                })
            })
            .collect())
    }
}
