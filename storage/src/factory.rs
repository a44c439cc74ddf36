//! Backend construction keyed by a closed enumeration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{StorageError, StorageResult};
use crate::memory::MemoryRateStorage;
use crate::postgres::PgRateStorage;
use crate::storage::RateStorage;

/// The persistence targets ratesync can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl StorageBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        }
    }

    /// Parse a list of configuration strings, failing on the first unknown.
    pub fn parse_list<S: AsRef<str>>(values: &[S]) -> StorageResult<Vec<Self>> {
        values.iter().map(|v| v.as_ref().parse()).collect()
    }
}

impl FromStr for StorageBackend {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            _ => Err(StorageError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings the factory needs, assembled once by the
/// configuration layer.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub database_url: String,
    pub table: String,
    pub migrate: bool,
}

/// Build one configured backend.
pub async fn build_storage(
    backend: StorageBackend,
    settings: &StorageSettings,
) -> StorageResult<Arc<dyn RateStorage>> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryRateStorage::new())),
        StorageBackend::Postgres => {
            let storage =
                PgRateStorage::connect(&settings.database_url, settings.table.clone(), None)
                    .await?;
            if settings.migrate {
                storage.migrate().await?;
            }
            Ok(Arc::new(storage))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_backends_case_insensitively() {
        assert_eq!(
            "Postgres".parse::<StorageBackend>().unwrap(),
            StorageBackend::Postgres
        );
        assert_eq!(
            "MEMORY".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
    }

    #[test]
    fn rejects_unknown_backends() {
        let err = "mongodb".parse::<StorageBackend>().unwrap_err();
        assert!(matches!(err, StorageError::UnknownBackend(name) if name == "mongodb"));
    }

    #[test]
    fn parse_list_fails_on_first_invalid() {
        assert!(StorageBackend::parse_list(&["memory", "cassandra"]).is_err());
        assert_eq!(
            StorageBackend::parse_list(&["memory", "postgres"]).unwrap(),
            vec![StorageBackend::Memory, StorageBackend::Postgres]
        );
    }

    #[tokio::test]
    async fn builds_the_memory_backend() {
        let settings = StorageSettings {
            database_url: String::new(),
            table: "rates".to_string(),
            migrate: false,
        };
        let storage = build_storage(StorageBackend::Memory, &settings)
            .await
            .unwrap();
        assert_eq!(storage.name(), "memory");
    }
}
