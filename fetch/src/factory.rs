//! Fetcher construction keyed by provider tag.

use std::sync::Arc;

use ratesync_common::RateProvider;

use crate::exchangeratesapi::{ExchangeRatesApiFetcher, EXCHANGE_RATES_API_URL};
use crate::fetcher::RateFetcher;
use crate::freeconv::{FreeConvConfig, FreeCurrConvFetcher};

/// Settings for every known provider, assembled once by the configuration
/// layer.
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub freeconv: FreeConvConfig,
    pub exchange_rates_url: String,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            freeconv: FreeConvConfig::new("", 2, 100),
            exchange_rates_url: EXCHANGE_RATES_API_URL.to_string(),
        }
    }
}

/// Build the fetcher for a provider tag.
pub fn build_fetcher(provider: RateProvider, settings: &FetcherSettings) -> Arc<dyn RateFetcher> {
    let client = reqwest::Client::new();
    match provider {
        RateProvider::FreeCurrConversion => Arc::new(FreeCurrConvFetcher::new(
            client,
            settings.freeconv.clone(),
        )),
        RateProvider::ExchangeRatesApi => Arc::new(ExchangeRatesApiFetcher::new(
            client,
            settings.exchange_rates_url.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_fetcher_for_every_provider() {
        let settings = FetcherSettings::default();
        for provider in RateProvider::all() {
            // Construction must not touch the network.
            let _ = build_fetcher(provider, &settings);
        }
    }
}
