//! Rate record value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::pair::CurrencyPair;
use crate::provider::RateProvider;

/// One foreign-exchange rate observation.
///
/// Born when a fetcher parses an upstream response, write-once at the
/// storage layer afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub from: String,
    pub to: String,
    pub provider: RateProvider,
    pub rate: f32,
    pub created_at: DateTime<Utc>,
}

impl RateRecord {
    /// Create a record for the given pair, stamped with `created_at`.
    pub fn new(
        pair: &CurrencyPair,
        provider: RateProvider,
        rate: f32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            from: pair.from().to_string(),
            to: pair.to().to_string(),
            provider,
            rate,
            created_at,
        }
    }

    /// The canonical `"<FROM>_<TO>"` key this record is stored under.
    pub fn pair_key(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }
}

/// Identity assigned by a storage backend at write time.
///
/// Kept opaque to callers; each backend owns the shape it assigns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Uuid(Uuid),
    Serial(i64),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(id) => write!(f, "{id}"),
            Self::Serial(id) => write!(f, "{id}"),
        }
    }
}

/// A rate record together with its backend-assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRateRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: RateRecord,
}
