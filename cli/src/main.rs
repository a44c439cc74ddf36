//! Ratesync Binary
//!
//! Periodically fetches foreign-exchange rates and persists them to the
//! configured storage backends.

mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratesync_common::CurrencyPair;
use ratesync_fetch::build_fetcher;
use ratesync_service::RateService;
use ratesync_storage::{build_storage, RateStorage};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "ratesync", version, about = "ISO currency rate fetcher")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch rates once, or keep fetching on a fixed interval.
    Fetch {
        /// Run as a long-lived process fetching every --interval seconds.
        #[arg(long)]
        standalone: bool,

        /// Seconds between fetch cycles in standalone mode.
        #[arg(long, default_value_t = 3600)]
        interval: u64,

        /// Log every stored record after a successful cycle.
        #[arg(long)]
        debug: bool,
    },
    /// Create schemas and indexes on the configured backends.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        return Err(anyhow::anyhow!("configuration error: {}", e));
    }

    match cli.command {
        Command::Migrate => migrate(&config).await,
        Command::Fetch {
            standalone,
            interval,
            debug,
        } => {
            fetch(
                &config,
                standalone,
                Duration::from_secs(interval.max(1)),
                debug,
            )
            .await
        }
    }
}

async fn build_storages(config: &Config) -> anyhow::Result<Vec<Arc<dyn RateStorage>>> {
    let mut storages = Vec::with_capacity(config.backends.len());
    for backend in &config.backends {
        storages.push(build_storage(*backend, &config.storage).await?);
    }
    Ok(storages)
}

async fn migrate(config: &Config) -> anyhow::Result<()> {
    for storage in build_storages(config).await? {
        storage.migrate().await?;
        info!(backend = storage.name(), "migrated");
    }
    Ok(())
}

async fn fetch(
    config: &Config,
    standalone: bool,
    interval: Duration,
    dump_records: bool,
) -> anyhow::Result<()> {
    let fetcher = build_fetcher(config.fetcher, &config.fetchers);
    let storages = build_storages(config).await?;
    let service = RateService::new(fetcher, storages);

    if !standalone {
        return run_cycle(&service, &config.pairs, dump_records).await;
    }

    info!(
        every_secs = interval.as_secs(),
        pairs = config.pairs.len(),
        "standalone fetch loop started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A failed cycle is logged and the loop keeps going; it
                // never takes the process down.
                if let Err(err) = run_cycle(&service, &config.pairs, dump_records).await {
                    error!(error = %err, "fetch cycle failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

async fn run_cycle(
    service: &RateService,
    pairs: &[CurrencyPair],
    dump_records: bool,
) -> anyhow::Result<()> {
    let saved = service.save(pairs).await?;

    for (backend, records) in &saved {
        info!(backend = %backend, records = records.len(), "batch persisted");
        if dump_records {
            for stored in records {
                debug!(
                    backend = %backend,
                    id = %stored.id,
                    pair = %stored.record.pair_key(),
                    rate = stored.record.rate,
                    "stored record"
                );
            }
        }
    }

    Ok(())
}
