//! Fetch-aggregate-persist orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use ratesync_common::{CurrencyPair, StoredRateRecord};
use ratesync_fetch::RateFetcher;
use ratesync_storage::RateStorage;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::ServiceResult;

/// Fetches a batch once and fans it out to every configured backend.
pub struct RateService {
    fetcher: Arc<dyn RateFetcher>,
    storages: Vec<Arc<dyn RateStorage>>,
}

impl RateService {
    pub fn new(fetcher: Arc<dyn RateFetcher>, storages: Vec<Arc<dyn RateStorage>>) -> Self {
        Self { fetcher, storages }
    }

    /// Fetch rates for `pairs` and persist the batch to every backend.
    ///
    /// The fetcher is called exactly once; a fetch error returns before any
    /// backend is touched. Each backend persists the same batch in its own
    /// task. A failed backend fails the whole call with the first error
    /// received, but sibling backends are not canceled or rolled back:
    /// whatever they committed stays durable.
    pub async fn save(
        &self,
        pairs: &[CurrencyPair],
    ) -> ServiceResult<HashMap<String, Vec<StoredRateRecord>>> {
        let fetched = Arc::new(self.fetcher.fetch(pairs).await?);
        info!(
            records = fetched.len(),
            backends = self.storages.len(),
            "persisting fetched batch"
        );

        // Both channels hold one slot per backend so no sender ever blocks.
        let capacity = self.storages.len().max(1);
        let (result_tx, mut result_rx) = mpsc::channel(capacity);
        let (error_tx, mut error_rx) = mpsc::channel(capacity);

        let mut tasks = JoinSet::new();
        for storage in &self.storages {
            let storage = storage.clone();
            let batch = fetched.clone();
            let result_tx = result_tx.clone();
            let error_tx = error_tx.clone();
            tasks.spawn(async move {
                match storage.store(&batch).await {
                    Ok(stored) => {
                        let _ = result_tx.send((storage.name(), stored)).await;
                    }
                    Err(err) => {
                        warn!(backend = storage.name(), error = %err, "persist failed");
                        let _ = error_tx.send(err).await;
                    }
                }
            });
        }
        drop(result_tx);
        drop(error_tx);

        // Barrier: every persist task has finished before anything is read,
        // which also closes both channels.
        while let Some(joined) = tasks.join_next().await {
            if let Err(join_err) = joined {
                std::panic::resume_unwind(join_err.into_panic());
            }
        }

        let mut data = HashMap::with_capacity(self.storages.len());
        while let Some((name, stored)) = result_rx.recv().await {
            data.insert(name.to_string(), stored);
        }

        if let Some(err) = error_rx.recv().await {
            return Err(err.into());
        }

        Ok(data)
    }
}
