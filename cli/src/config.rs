//! Runtime configuration, bound from the environment once at startup.

use ratesync_common::{CurrencyPair, RateProvider};
use ratesync_fetch::FetcherSettings;
use ratesync_storage::{StorageBackend, StorageSettings};

/// Everything the binary needs, assembled once and passed by reference into
/// the service constructors. There is no process-wide mutable configuration
/// state.
#[derive(Debug, Clone)]
pub struct Config {
    /// The provider rates are fetched from.
    pub fetcher: RateProvider,
    /// The pairs fetched every cycle.
    pub pairs: Vec<CurrencyPair>,
    /// The backends every fetched batch is persisted to.
    pub backends: Vec<StorageBackend>,
    /// Backend connection settings.
    pub storage: StorageSettings,
    /// Per-provider fetcher settings.
    pub fetchers: FetcherSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: RateProvider::ExchangeRatesApi,
            pairs: Vec::new(),
            backends: vec![StorageBackend::Memory],
            storage: StorageSettings {
                database_url: String::new(),
                table: "currency_rates".to_string(),
                migrate: false,
            },
            fetchers: FetcherSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from `RATESYNC_*` environment variables.
    ///
    /// Unset variables keep their defaults; set-but-invalid values fail
    /// instead of being silently ignored.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(fetcher) = env_var("RATESYNC_FETCHER") {
            config.fetcher = fetcher.parse()?;
        }

        if let Some(pairs) = env_var("RATESYNC_PAIRS") {
            config.pairs = CurrencyPair::parse_list(&split_csv(&pairs))?;
        }

        if let Some(backends) = env_var("RATESYNC_STORAGES") {
            config.backends = StorageBackend::parse_list(&split_csv(&backends))?;
        }

        if let Some(url) = env_var("RATESYNC_DATABASE_URL") {
            config.storage.database_url = url;
        }

        if let Some(table) = env_var("RATESYNC_TABLE") {
            config.storage.table = table;
        }

        if let Some(migrate) = env_var("RATESYNC_MIGRATE") {
            config.storage.migrate = migrate.parse()?;
        }

        if let Some(key) = env_var("RATESYNC_FREECONV_API_KEY") {
            config.fetchers.freeconv.api_key = key;
        }

        if let Some(url) = env_var("RATESYNC_FREECONV_URL") {
            config.fetchers.freeconv.base_url = url;
        }

        if let Some(value) = env_var("RATESYNC_FREECONV_MAX_PER_REQUEST") {
            config.fetchers.freeconv.max_per_request = value.parse()?;
        }

        if let Some(value) = env_var("RATESYNC_FREECONV_MAX_PER_HOUR") {
            config.fetchers.freeconv.max_per_hour = value.parse()?;
        }

        if let Some(url) = env_var("RATESYNC_EXCHANGERATES_URL") {
            config.fetchers.exchange_rates_url = url;
        }

        Ok(config)
    }

    /// Check cross-field consistency before anything connects.
    pub fn validate(&self) -> Result<(), String> {
        if self.pairs.is_empty() {
            return Err("at least one currency pair must be configured".to_string());
        }

        if self.backends.is_empty() {
            return Err("at least one storage backend must be configured".to_string());
        }

        if self.backends.contains(&StorageBackend::Postgres)
            && self.storage.database_url.is_empty()
        {
            return Err("the postgres backend needs RATESYNC_DATABASE_URL".to_string());
        }

        if self.fetcher == RateProvider::FreeCurrConversion {
            if self.fetchers.freeconv.api_key.is_empty() {
                return Err("the freecurrconversion fetcher needs an API key".to_string());
            }
            if self.fetchers.freeconv.max_per_request == 0 {
                return Err("max pairs per request must be at least 1".to_string());
            }
            if self.fetchers.freeconv.max_per_hour == 0 {
                return Err("the hourly request budget must be at least 1".to_string());
            }
        }

        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}
