//! Ratesync Storage Backends
//!
//! Persistence for fetched rate records behind the [`RateStorage`]
//! capability: an append-only, batch-atomic write path and paginated
//! range reads, with identity assignment owned by each backend.

pub mod error;
pub mod factory;
pub mod memory;
pub mod postgres;
pub mod storage;

pub use error::{StorageError, StorageResult};
pub use factory::{build_storage, StorageBackend, StorageSettings};
pub use memory::{MemoryRateStorage, MEMORY_STORAGE_NAME};
pub use postgres::{PgRateStorage, POSTGRES_STORAGE_NAME};
pub use storage::{IdGenerator, RateStorage, UuidIdGenerator};
