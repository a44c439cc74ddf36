//! Conversion lookups racing the configured backends.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use ratesync_common::{start_of_day, CurrencyPair, RateProvider};
use ratesync_storage::RateStorage;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};

/// Answers "convert this amount on this date via this provider" from
/// whichever backend responds first.
pub struct ConversionService {
    storages: Vec<Arc<dyn RateStorage>>,
}

impl ConversionService {
    pub fn new(storages: Vec<Arc<dyn RateStorage>>) -> Self {
        Self { storages }
    }

    /// Convert `amount` from `from` to `to` using the rate `provider`
    /// observed on the calendar day of `date`.
    ///
    /// The lookup window runs from midnight of `date` (in `date`'s own
    /// timezone) up to `date` itself. With several backends configured the
    /// lookup is raced: the first backend to answer without an error
    /// decides the outcome, backend errors only surface once every backend
    /// has failed, and `deadline` bounds the whole wait. Losing lookups are
    /// left to finish on their own; their answers are discarded.
    pub async fn convert<Tz>(
        &self,
        from: &str,
        to: &str,
        provider: RateProvider,
        amount: f32,
        date: DateTime<Tz>,
        deadline: Duration,
    ) -> ServiceResult<f32>
    where
        Tz: TimeZone,
        Tz::Offset: Send,
    {
        if self.storages.is_empty() {
            return Err(ServiceError::NoStorageConfigured);
        }

        let pair = CurrencyPair::new(from, to)?;
        let start = start_of_day(&date).with_timezone(&Utc);
        let end = date.with_timezone(&Utc);

        // Single backend: plain call, no race overhead.
        if let [storage] = self.storages.as_slice() {
            let found = storage
                .get_by_date_and_provider(&pair, Some(provider), start, end, 1, 1)
                .await?;
            return match found.first() {
                Some(stored) => multiply(amount, stored.record.rate),
                None => Err(ServiceError::RateNotFound),
            };
        }

        // One slot per backend so losing senders never block on a channel
        // nobody drains.
        let (tx, mut rx) = mpsc::channel(self.storages.len());
        for storage in &self.storages {
            let storage = storage.clone();
            let pair = pair.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = storage
                    .get_by_date_and_provider(&pair, Some(provider), start, end, 1, 1)
                    .await;
                let _ = tx.send((storage.name(), result)).await;
            });
        }
        drop(tx);

        let timer = tokio::time::sleep(deadline);
        tokio::pin!(timer);

        let mut first_err: Option<ServiceError> = None;
        loop {
            tokio::select! {
                _ = &mut timer => return Err(ServiceError::Timeout),
                received = rx.recv() => match received {
                    Some((backend, Ok(found))) => {
                        debug!(backend, "first backend answered");
                        return match found.first() {
                            Some(stored) => multiply(amount, stored.record.rate),
                            None => Err(ServiceError::RateNotFound),
                        };
                    }
                    Some((backend, Err(err))) => {
                        warn!(backend, error = %err, "backend lookup failed");
                        if first_err.is_none() {
                            first_err = Some(err.into());
                        }
                    }
                    // Every backend has answered and none succeeded.
                    None => return Err(first_err.unwrap_or(ServiceError::RateNotFound)),
                }
            }
        }
    }
}

/// Fixed-point multiply rounded to six decimal places.
///
/// Both operands pass through `Decimal` so the result is exact before the
/// final rounding, and it comes back as the same 32-bit float type the
/// rates are stored with.
fn multiply(amount: f32, rate: f32) -> ServiceResult<f32> {
    let amount = Decimal::from_f32(amount).ok_or(ServiceError::NonFiniteAmount)?;
    let rate = Decimal::from_f32(rate).ok_or(ServiceError::NonFiniteAmount)?;
    let product =
        (amount * rate).round_dp_with_strategy(6, RoundingStrategy::MidpointAwayFromZero);
    product.to_f32().ok_or(ServiceError::NonFiniteAmount)
}
