//! Multi-base fan-out fetcher for the Exchange Rates API.

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
pub const EXCHANGE_RATES_API_URL: &str = "https://api.exchangeratesapi.io/latest";

/// One upstream response: every requested target priced against one base.
#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    base: String,
    #[serde(default)]
    rates: HashMap<String, f32>,
}

/// Fetcher for a provider whose endpoint takes a single base currency and
/// returns rates for many targets.
///
/// The requested pairs are grouped by base currency and one concurrent call
/// is issued per distinct base; all calls feed the same aggregator. The
/// first failing call aborts its siblings and becomes the fetch result.
pub struct ExchangeRatesApiFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl ExchangeRatesApiFetcher {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch_base(
        client: reqwest::Client,
        base_url: String,
        base: String,
        targets: Vec<String>,
    ) -> FetchResult<Vec<RateRecord>> {
        let symbols = targets.join(",");

        let response = client
            .get(&base_url)
            .header(ACCEPT, "application/json")
            .query(&[("symbols", symbols.as_str()), ("base", base.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(match status.as_u16() {
                400 => FetchError::ClientError {
                    status: 400,
                    message: String::new(),
                },
                500 => FetchError::ServerError { status: 500 },
                other => FetchError::UnknownStatus { status: other },
            });
        }

        let body: RatesResponse = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        let fetched_at = Utc::now();
        let mut records = Vec::with_capacity(body.rates.len());
        for (target, rate) in body.rates {
            let pair = CurrencyPair::new(&body.base, &target)
                .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
            records.push(RateRecord::new(
                &pair,
                RateProvider::ExchangeRatesApi,
                rate,
                fetched_at,
            ));
        }

        Ok(records)
    }
}

/// Group pairs into one upstream call per base currency, keeping first-seen
/// base order and per-base target order.
fn group_by_base(pairs: &[CurrencyPair]) -> Vec<(String, Vec<String>)> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();

    for pair in pairs {
        let targets = grouped.entry(pair.from().to_string()).or_insert_with(|| {
            order.push(pair.from().to_string());
            Vec::new()
        });
        targets.push(pair.to().to_string());
    }

    order
        .into_iter()
        .map(|base| {
            let targets = grouped.remove(&base).unwrap_or_default();
            (base, targets)
        })
        .collect()
}

#[async_trait]
impl RateFetcher for ExchangeRatesApiFetcher {
    async fn fetch(&self, pairs: &[CurrencyPair]) -> FetchResult<Vec<RateRecord>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let groups = group_by_base(pairs);
        debug!(pairs = pairs.len(), bases = groups.len(), "fetching per base");

        let (tx, rx) = mpsc::channel(groups.len());
        let aggregator = fanin::spawn_aggregator(rx, pairs.len());

        let mut producers = JoinSet::new();
        for (base, targets) in groups {
            let client = self.client.clone();
            let base_url = self.base_url.clone();
            let tx = tx.clone();
            producers.spawn(async move {
                let records = Self::fetch_base(client, base_url, base, targets).await?;
                let _ = tx.send(records).await;
                Ok(())
            });
        }

        fanin::drain(producers, tx, aggregator).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testserver::{decode_query_param, serve};

    fn pairs(keys: &[&str]) -> Vec<CurrencyPair> {
        CurrencyPair::parse_list(keys).unwrap()
    }

    /// Answer each request with rates for every requested symbol.
    fn echo_rates(target: &str) -> (u16, String) {
        let base = decode_query_param(target, "base").unwrap_or_default();
        let symbols = decode_query_param(target, "symbols").unwrap_or_default();
        let rates = symbols
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| format!("\"{s}\":117.5"))
            .collect::<Vec<_>>()
            .join(",");
        (
            200,
            format!(r#"{{"base":"{base}","rates":{{{rates}}},"date":"2024-03-15"}}"#),
        )
    }

    #[test]
    fn groups_by_base_preserving_order() {
        let grouped = group_by_base(&pairs(&["EUR_USD", "USD_JPY", "EUR_JPY", "EUR_GBP"]));

        assert_eq!(
            grouped,
            vec![
                (
                    "EUR".to_string(),
                    vec!["USD".to_string(), "JPY".to_string(), "GBP".to_string()]
                ),
                ("USD".to_string(), vec!["JPY".to_string()]),
            ]
        );
    }

    #[tokio::test]
    async fn issues_one_call_per_base() {
        let server = serve(echo_rates).await;
        let fetcher = ExchangeRatesApiFetcher::new(reqwest::Client::new(), server.url());

        let records = fetcher
            .fetch(&pairs(&["EUR_USD", "EUR_JPY", "USD_JPY"]))
            .await
            .unwrap();

        assert_eq!(server.hits(), 2);
        assert_eq!(records.len(), 3);
        assert!(records
            .iter()
            .all(|r| r.provider == RateProvider::ExchangeRatesApi));

        let mut keys: Vec<String> = records.iter().map(|r| r.pair_key()).collect();
        keys.sort();
        assert_eq!(keys, ["EUR_JPY", "EUR_USD", "USD_JPY"]);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let server = serve(echo_rates).await;
        let fetcher = ExchangeRatesApiFetcher::new(reqwest::Client::new(), server.url());

        let records = fetcher.fetch(&[]).await.unwrap();

        assert!(records.is_empty());
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn first_failing_base_fails_the_fetch() {
        let server = serve(|target| {
            match decode_query_param(target, "base").as_deref() {
                Some("USD") => (500, String::new()),
                _ => echo_rates(target),
            }
        })
        .await;
        let fetcher = ExchangeRatesApiFetcher::new(reqwest::Client::new(), server.url());

        let result = fetcher
            .fetch(&pairs(&["EUR_USD", "USD_JPY", "GBP_USD"]))
            .await;

        assert!(matches!(
            result,
            Err(FetchError::ServerError { status: 500 })
        ));
    }

    #[tokio::test]
    async fn unexpected_status_is_unknown() {
        let server = serve(|_| (302, String::new())).await;
        let fetcher = ExchangeRatesApiFetcher::new(reqwest::Client::new(), server.url());

        let result = fetcher.fetch(&pairs(&["EUR_USD"])).await;

        assert!(matches!(
            result,
            Err(FetchError::UnknownStatus { status: 302 })
        ));
    }

    #[tokio::test]
    async fn malformed_target_in_body_is_malformed() {
        let server = serve(|_| {
            (
                200,
                r#"{"base":"EUR","rates":{"US1":1.2},"date":"2024-03-15"}"#.to_string(),
            )
        })
        .await;
        let fetcher = ExchangeRatesApiFetcher::new(reqwest::Client::new(), server.url());

        let result = fetcher.fetch(&pairs(&["EUR_USD"])).await;

        assert!(matches!(result, Err(FetchError::MalformedResponse(_))));
    }
}
