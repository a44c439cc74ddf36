//! Storage capability trait and identity generation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ratesync_common::{CurrencyPair, RateProvider, RateRecord, StoredRateRecord};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Trait for rate persistence backends.
///
/// Writes are append-only and atomic per batch; reads are filtered by pair,
/// provider and creation-time window, ordered by creation time and
/// 1-indexed-paginated. The convenience reads delegate to
/// [`get_by_date_and_provider`](RateStorage::get_by_date_and_provider), the
/// general case every backend implements.
#[async_trait]
pub trait RateStorage: Send + Sync {
    /// Persist a batch, assigning an identity per record.
    ///
    /// All-or-nothing: on any failure mid-batch nothing is committed. The
    /// output preserves the input order.
    async fn store(&self, records: &[RateRecord]) -> StorageResult<Vec<StoredRateRecord>>;

    /// All records for a pair, any provider, from the epoch up to now.
    async fn get(
        &self,
        pair: &CurrencyPair,
        page: i64,
        per_page: i64,
    ) -> StorageResult<Vec<StoredRateRecord>> {
        self.get_by_date_and_provider(pair, None, DateTime::UNIX_EPOCH, Utc::now(), page, per_page)
            .await
    }

    /// All records for a pair and provider, from the epoch up to now.
    async fn get_by_provider(
        &self,
        pair: &CurrencyPair,
        provider: RateProvider,
        page: i64,
        per_page: i64,
    ) -> StorageResult<Vec<StoredRateRecord>> {
        self.get_by_date_and_provider(
            pair,
            Some(provider),
            DateTime::UNIX_EPOCH,
            Utc::now(),
            page,
            per_page,
        )
        .await
    }

    /// Records for a pair within a creation-time window, any provider.
    async fn get_by_date(
        &self,
        pair: &CurrencyPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: i64,
        per_page: i64,
    ) -> StorageResult<Vec<StoredRateRecord>> {
        self.get_by_date_and_provider(pair, None, start, end, page, per_page)
            .await
    }

    /// The general lookup: pair, optional provider filter, inclusive
    /// creation-time window. Fails with `InvalidTimeRange` before querying
    /// when `start > end`.
    async fn get_by_date_and_provider(
        &self,
        pair: &CurrencyPair,
        provider: Option<RateProvider>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: i64,
        per_page: i64,
    ) -> StorageResult<Vec<StoredRateRecord>>;

    /// Idempotent schema/index creation.
    async fn migrate(&self) -> StorageResult<()>;

    /// Administrative bulk deletion; not part of the steady-state path.
    async fn drop_store(&self) -> StorageResult<()>;

    /// Release the backend's resources.
    async fn close(&self) -> StorageResult<()>;

    /// Stable identifier used as the aggregation key when fanning out
    /// across backends. Must be unique among configured backends.
    fn name(&self) -> &'static str;
}

/// Trait for pluggable record-identity generation.
///
/// A generator must yield exactly 16 bytes; anything else is rejected
/// before a single row is written.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Vec<u8>;
}

/// Default generator: random UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> Vec<u8> {
        Uuid::new_v4().as_bytes().to_vec()
    }
}

/// Turn a generator's output into a UUID, enforcing the 16-byte contract.
pub(crate) fn uuid_from_generator(generator: &dyn IdGenerator) -> StorageResult<Uuid> {
    let bytes = generator.generate();
    let array: [u8; 16] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| StorageError::NotEnoughIdBytes { got: bytes.len() })?;
    Ok(Uuid::from_bytes(array))
}

/// Shared window guard: `start` may not come after `end`.
pub(crate) fn check_range(start: DateTime<Utc>, end: DateTime<Utc>) -> StorageResult<()> {
    if start > end {
        return Err(StorageError::InvalidTimeRange { start, end });
    }
    Ok(())
}
