//! PostgreSQL storage backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ratesync_common::{
    CurrencyPair, PairParseError, ProviderParseError, RateProvider, RateRecord, RecordId,
    StoredRateRecord,
};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::storage::{check_range, uuid_from_generator, IdGenerator, RateStorage, UuidIdGenerator};

/// Aggregation key for this backend.
pub const POSTGRES_STORAGE_NAME: &str = "postgres";

pub struct PgRateStorage {
    pool: PgPool,
    table: String,
    id_generator: Arc<dyn IdGenerator>,
}

#[derive(Debug, FromRow)]
struct RateRow {
    id: Uuid,
    currency: String,
    provider: String,
    rate: f32,
    created_at: DateTime<Utc>,
}

impl RateRow {
    fn into_stored(self) -> StorageResult<StoredRateRecord> {
        let pair: CurrencyPair = self
            .currency
            .parse()
            .map_err(|e: PairParseError| StorageError::CorruptRecord(e.to_string()))?;
        let provider: RateProvider = self
            .provider
            .parse()
            .map_err(|e: ProviderParseError| StorageError::CorruptRecord(e.to_string()))?;

        Ok(StoredRateRecord {
            id: RecordId::Uuid(self.id),
            record: RateRecord::new(&pair, provider, self.rate, self.created_at),
        })
    }
}

impl PgRateStorage {
    /// Connect to `url` and store rates in `table`.
    ///
    /// `id_generator` defaults to random UUIDs when `None`. The table name
    /// comes from trusted configuration; it is interpolated, not bound.
    pub async fn connect(
        url: &str,
        table: impl Into<String>,
        id_generator: Option<Arc<dyn IdGenerator>>,
    ) -> StorageResult<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool, table, id_generator))
    }

    pub fn new(
        pool: PgPool,
        table: impl Into<String>,
        id_generator: Option<Arc<dyn IdGenerator>>,
    ) -> Self {
        Self {
            pool,
            table: table.into(),
            id_generator: id_generator.unwrap_or_else(|| Arc::new(UuidIdGenerator)),
        }
    }

    fn insert_sql(&self, rows: usize) -> String {
        let mut sql = format!(
            "INSERT INTO {} (id, currency, provider, rate, created_at) VALUES ",
            self.table
        );
        let placeholders: Vec<String> = (0..rows)
            .map(|i| {
                let base = i * 5;
                format!(
                    "(${},${},${},${},${})",
                    base + 1,
                    base + 2,
                    base + 3,
                    base + 4,
                    base + 5
                )
            })
            .collect();
        sql.push_str(&placeholders.join(","));
        sql
    }

    fn select_sql(&self, with_provider: bool) -> String {
        let mut sql = format!(
            "SELECT id, currency, provider, rate, created_at FROM {} \
             WHERE currency = $1 AND created_at BETWEEN $2 AND $3",
            self.table
        );
        if with_provider {
            sql.push_str(" AND provider = $4 ORDER BY created_at LIMIT $5 OFFSET $6");
        } else {
            sql.push_str(" ORDER BY created_at LIMIT $4 OFFSET $5");
        }
        sql
    }
}

#[async_trait]
impl RateStorage for PgRateStorage {
    async fn store(&self, records: &[RateRecord]) -> StorageResult<Vec<StoredRateRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        // Identities are assigned before the transaction opens; a failing
        // generator leaves the table untouched.
        let mut ids = Vec::with_capacity(records.len());
        for _ in records {
            ids.push(uuid_from_generator(self.id_generator.as_ref())?);
        }

        let sql = self.insert_sql(records.len());
        let mut query = sqlx::query(&sql);
        for (record, id) in records.iter().zip(&ids) {
            query = query
                .bind(*id)
                .bind(record.pair_key())
                .bind(record.provider.as_str())
                .bind(record.rate)
                .bind(record.created_at);
        }

        let mut tx = self.pool.begin().await?;
        query.execute(&mut *tx).await?;
        tx.commit().await?;

        debug!(rows = records.len(), table = %self.table, "stored rate batch");
        Ok(records
            .iter()
            .zip(ids)
            .map(|(record, id)| StoredRateRecord {
                id: RecordId::Uuid(id),
                record: record.clone(),
            })
            .collect())
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

        let sql = self.select_sql(provider.is_some());
        let mut query = sqlx::query_as::<_, RateRow>(&sql)
            .bind(pair.storage_key())
            .bind(start)
            .bind(end);
        if let Some(provider) = provider {
            query = query.bind(provider.as_str());
        }
        let rows = query
            .bind(per_page)
            .bind((page - 1) * per_page)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(RateRow::into_stored).collect()
    }

    async fn migrate(&self) -> StorageResult<()> {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             id UUID PRIMARY KEY, \
             currency VARCHAR(20) NOT NULL, \
             provider VARCHAR(30) NOT NULL, \
             rate REAL NOT NULL, \
             created_at TIMESTAMPTZ NOT NULL DEFAULT NOW())",
            self.table
        );
        sqlx::query(&create).execute(&self.pool).await?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS {0}_search_idx ON {0} (currency, provider, created_at)",
            self.table
        );
        sqlx::query(&index).execute(&self.pool).await?;

        Ok(())
    }

    async fn drop_store(&self) -> StorageResult<()> {
        let drop = format!("DROP TABLE IF EXISTS {}", self.table);
        sqlx::query(&drop).execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        POSTGRES_STORAGE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn lazy_storage() -> PgRateStorage {
        let pool = PgPool::connect_lazy("postgres://localhost/ratesync").unwrap();
        PgRateStorage::new(pool, "rates", None)
    }

    #[tokio::test]
    async fn insert_sql_numbers_placeholders_per_row() {
        let storage = lazy_storage();
        assert_eq!(
            storage.insert_sql(2),
            "INSERT INTO rates (id, currency, provider, rate, created_at) \
             VALUES ($1,$2,$3,$4,$5),($6,$7,$8,$9,$10)"
        );
    }

    #[tokio::test]
    async fn select_sql_shifts_pagination_binds_for_provider_filter() {
        let storage = lazy_storage();
        assert!(storage
            .select_sql(false)
            .ends_with("ORDER BY created_at LIMIT $4 OFFSET $5"));
        assert!(storage
            .select_sql(true)
            .ends_with("AND provider = $4 ORDER BY created_at LIMIT $5 OFFSET $6"));
    }

    #[tokio::test]
    async fn inverted_window_fails_before_querying() {
        // The lazy pool never connects; reaching the database would error
        // differently.
        let storage = lazy_storage();
        let now = Utc::now();

        let result = storage
            .get_by_date(
                &"EUR_USD".parse().unwrap(),
                now,
                now - Duration::seconds(1),
                1,
                1,
            )
            .await;

        assert!(matches!(
            result,
            Err(StorageError::InvalidTimeRange { .. })
        ));
    }

    mod live {
        //! Round-trip tests against a running PostgreSQL.
        //!
        //! Run with: RATESYNC_TEST_DATABASE_URL=postgres://... \
        //!           cargo test -p ratesync-storage -- --ignored

        use super::*;

        async fn connect(table: &str) -> PgRateStorage {
            let url = std::env::var("RATESYNC_TEST_DATABASE_URL")
                .expect("RATESYNC_TEST_DATABASE_URL must point at a test database");
            let storage = PgRateStorage::connect(&url, table, None).await.unwrap();
            storage.drop_store().await.unwrap();
            storage.migrate().await.unwrap();
            storage
        }

        fn record(rate: f32) -> RateRecord {
            RateRecord::new(
                &"EUR_USD".parse().unwrap(),
                RateProvider::FreeCurrConversion,
                rate,
                Utc::now(),
            )
        }

        #[tokio::test]
        #[ignore = "requires a running PostgreSQL"]
        async fn store_then_get_round_trips() {
            let storage = connect("rates_roundtrip_test").await;
            let stored = storage.store(&[record(0.8)]).await.unwrap();

            let at = stored[0].record.created_at;
            let found = storage
                .get_by_date_and_provider(
                    &"EUR_USD".parse().unwrap(),
                    Some(RateProvider::FreeCurrConversion),
                    at - Duration::seconds(1),
                    at + Duration::seconds(1),
                    1,
                    1,
                )
                .await
                .unwrap();

            assert_eq!(found.len(), 1);
            assert_eq!(found[0].id, stored[0].id);
            assert_eq!(found[0].record.rate, 0.8);
            storage.drop_store().await.unwrap();
        }

        #[tokio::test]
        #[ignore = "requires a running PostgreSQL"]
        async fn failing_generator_commits_nothing() {
            struct ShortIdGenerator;
            impl IdGenerator for ShortIdGenerator {
                fn generate(&self) -> Vec<u8> {
                    vec![1, 2, 3, 4]
                }
            }

            let url = std::env::var("RATESYNC_TEST_DATABASE_URL")
                .expect("RATESYNC_TEST_DATABASE_URL must point at a test database");
            let table = "rates_atomicity_test";
            let setup = PgRateStorage::connect(&url, table, None).await.unwrap();
            setup.drop_store().await.unwrap();
            setup.migrate().await.unwrap();

            let storage =
                PgRateStorage::connect(&url, table, Some(Arc::new(ShortIdGenerator)))
                    .await
                    .unwrap();
            let result = storage.store(&[record(1.0)]).await;
            assert!(matches!(
                result,
                Err(StorageError::NotEnoughIdBytes { got: 4 })
            ));

            let rows = setup.get(&"EUR_USD".parse().unwrap(), 1, 10).await.unwrap();
            assert!(rows.is_empty());
            setup.drop_store().await.unwrap();
        }
    }
}
