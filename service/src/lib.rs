//! Ratesync Services
//!
//! The two entry points the command surface consumes: fetch-and-persist
//! ([`RateService::save`]) and conversion lookups
//! ([`ConversionService::convert`]). Both fan out across the configured
//! storage backends; neither retries on failure.

pub mod conversion;
pub mod error;
pub mod save;

pub use conversion::ConversionService;
pub use error::{ServiceError, ServiceResult};
pub use save::RateService;
