//! In-process storage backend.
//!
//! Keeps every record in a concurrent map keyed by the canonical pair key.
//! Useful as a lightweight second backend and as the workhorse behind the
//! service-layer tests, with the same filtering, ordering and pagination
//! semantics as the database backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ratesync_common::{CurrencyPair, RateProvider, RateRecord, RecordId, StoredRateRecord};

use crate::error::StorageResult;
use crate::storage::{check_range, uuid_from_generator, IdGenerator, RateStorage, UuidIdGenerator};

/// Aggregation key for this backend.
pub const MEMORY_STORAGE_NAME: &str = "memory";

pub struct MemoryRateStorage {
    records: DashMap<String, Vec<StoredRateRecord>>,
    id_generator: Arc<dyn IdGenerator>,
}

impl MemoryRateStorage {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(UuidIdGenerator))
    }

    pub fn with_id_generator(id_generator: Arc<dyn IdGenerator>) -> Self {
        Self {
            records: DashMap::new(),
            id_generator,
        }
    }

    /// Total record count across all pairs.
    pub fn len(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryRateStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateStorage for MemoryRateStorage {
    async fn store(&self, records: &[RateRecord]) -> StorageResult<Vec<StoredRateRecord>> {
        // Assign every identity before touching the map so a failing
        // generator commits nothing.
        let mut stored = Vec::with_capacity(records.len());
        for record in records {
            let id = uuid_from_generator(self.id_generator.as_ref())?;
            stored.push(StoredRateRecord {
                id: RecordId::Uuid(id),
                record: record.clone(),
            });
        }

        for item in &stored {
            self.records
                .entry(item.record.pair_key())
                .or_default()
                .push(item.clone());
        }

        Ok(stored)
    }

    async fn get_by_date_and_provider(
        &self,
        pair: &CurrencyPair,
        provider: Option<RateProvider>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: i64,
        per_page: i64,
    ) -> StorageResult<Vec<StoredRateRecord>> {
        check_range(start, end)?;

        let mut matches: Vec<StoredRateRecord> = self
            .records
            .get(&pair.storage_key())
            .map(|entry| {
                entry
                    .iter()
                    .filter(|item| {
                        item.record.created_at >= start
                            && item.record.created_at <= end
                            && provider.map_or(true, |p| item.record.provider == p)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Stable sort keeps insertion order for equal timestamps.
        matches.sort_by_key(|item| item.record.created_at);

        let offset = ((page - 1) * per_page).max(0) as usize;
        let limit = per_page.max(0) as usize;
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn migrate(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn drop_store(&self) -> StorageResult<()> {
        self.records.clear();
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        MEMORY_STORAGE_NAME
    }
}
