//! Budget-limited chunked fetcher for the Free Currency Conversion API.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use ratesync_common::{CurrencyPair, RateProvider, RateRecord};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::fanin;
use crate::fetcher::RateFetcher;

/// Default upstream endpoint.
pub const FREECONV_URL: &str = "https://free.currconv.com/api/v7/convert";

/// Settings for [`FreeCurrConvFetcher`].
#[derive(Debug, Clone)]
pub struct FreeConvConfig {
    /// Upstream endpoint; overridable for tests.
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Maximum pairs per upstream call. Must be at least 1.
    pub max_per_request: usize,
    /// Upstream call budget a single fetch may not reach.
    pub max_per_hour: usize,
}

impl FreeConvConfig {
    /// Settings against the production endpoint.
    pub fn new(api_key: impl Into<String>, max_per_request: usize, max_per_hour: usize) -> Self {
        Self {
            base_url: FREECONV_URL.to_string(),
            api_key: api_key.into(),
            max_per_request,
            max_per_hour,
        }
    }
}

/// Error body the upstream returns alongside HTTP 400.
#[derive(Debug, Default, Deserialize)]
struct FreeConvErrorBody {
    #[serde(default)]
    error: String,
}

/// Fetcher for a provider that prices a fixed number of pairs per call and
/// sells a fixed number of calls per hour.
///
/// The budget guard is a per-call pre-flight check: `fetch` computes the
/// number of upstream calls the batch needs and refuses before any network
/// I/O when that reaches the hourly budget. No call history is kept across
/// invocations.
pub struct FreeCurrConvFetcher {
    client: reqwest::Client,
    config: FreeConvConfig,
}

impl FreeCurrConvFetcher {
    pub fn new(client: reqwest::Client, config: FreeConvConfig) -> Self {
        Self { client, config }
    }

    /// Upstream calls needed for a batch of `pairs` pairs.
    fn requests_needed(&self, pairs: usize) -> usize {
        pairs.div_ceil(self.config.max_per_request)
    }

    async fn fetch_chunk(
        client: reqwest::Client,
        config: FreeConvConfig,
        chunk: Vec<CurrencyPair>,
    ) -> FetchResult<Vec<RateRecord>> {
        let query = chunk
            .iter()
            .map(CurrencyPair::storage_key)
            .collect::<Vec<_>>()
            .join(",");

        let response = client
            .get(&config.base_url)
            .header(ACCEPT, "application/json")
            .query(&[
                ("q", query.as_str()),
                ("compact", "ultra"),
                ("apiKey", config.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(classify_error(status, &body));
        }

        let rates: HashMap<String, f32> = serde_json::from_str(&body)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        let fetched_at = Utc::now();
        let mut records = Vec::with_capacity(rates.len());
        for (key, rate) in rates {
            let pair: CurrencyPair = key
                .parse()
                .map_err(|e: ratesync_common::PairParseError| {
                    FetchError::MalformedResponse(e.to_string())
                })?;
            records.push(RateRecord::new(
                &pair,
                RateProvider::FreeCurrConversion,
                rate,
                fetched_at,
            ));
        }

        Ok(records)
    }
}

/// Map a non-200 response onto the error taxonomy.
///
/// The provider reports credential and quota problems inside a 400 body, so
/// those are sniffed before the generic status ranges.
fn classify_error(status: StatusCode, body: &str) -> FetchError {
    if status == StatusCode::BAD_REQUEST {
        let parsed: FreeConvErrorBody = serde_json::from_str(body).unwrap_or_default();
        if parsed.error.contains("required") {
            return FetchError::Unauthorized;
        }
        if parsed.error.contains("API limit reached") {
            return FetchError::RateLimitReached;
        }
        return FetchError::ClientError {
            status: status.as_u16(),
            message: parsed.error,
        };
    }

    if status.is_client_error() {
        FetchError::ClientError {
            status: status.as_u16(),
            message: String::new(),
        }
    } else if status.is_server_error() {
        FetchError::ServerError {
            status: status.as_u16(),
        }
    } else {
        FetchError::UnknownStatus {
            status: status.as_u16(),
        }
    }
}

#[async_trait]
impl RateFetcher for FreeCurrConvFetcher {
    async fn fetch(&self, pairs: &[CurrencyPair]) -> FetchResult<Vec<RateRecord>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let requests_needed = self.requests_needed(pairs.len());
        if requests_needed >= self.config.max_per_hour {
            return Err(FetchError::BudgetExceeded {
                requests_needed,
                max_per_hour: self.config.max_per_hour,
            });
        }

        debug!(
            pairs = pairs.len(),
            requests = requests_needed,
            "fetching batch in chunks"
        );

        let (tx, rx) = mpsc::channel(requests_needed);
        let aggregator = fanin::spawn_aggregator(rx, pairs.len());

        let mut producers = JoinSet::new();
        for chunk in pairs.chunks(self.config.max_per_request) {
            let client = self.client.clone();
            let config = self.config.clone();
            let chunk = chunk.to_vec();
            let tx = tx.clone();
            producers.spawn(async move {
                let records = Self::fetch_chunk(client, config, chunk).await?;
                let _ = tx.send(records).await;
                Ok(())
            });
        }

        fanin::drain(producers, tx, aggregator).await
    }
}
