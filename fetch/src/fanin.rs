//! Channel-based fan-in shared by the concrete fetchers.
//!
//! Producers only ever send on the records channel; a single aggregator
//! task owns the output vector. The result is published only after two
//! barriers have passed: every producer has finished (or been aborted) and
//! the aggregator has drained the closed channel.

use ratesync_common::RateRecord;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{FetchError, FetchResult};

/// Spawn the sole writer of the output vector.
pub(crate) fn spawn_aggregator(
    mut rx: mpsc::Receiver<Vec<RateRecord>>,
    capacity: usize,
) -> JoinHandle<Vec<RateRecord>> {
    tokio::spawn(async move {
        let mut records = Vec::with_capacity(capacity);
        while let Some(batch) = rx.recv().await {
            records.extend(batch);
        }
        records
    })
}

/// Await every producer, then the aggregator, then publish.
///
/// The first producer error wins and aborts the remaining producers, which
/// cancels their in-flight requests. The aggregator is still joined before
/// anything is returned, so no write to the shared output can race the
/// cancellation.
pub(crate) async fn drain(
    mut producers: JoinSet<FetchResult<()>>,
    tx: mpsc::Sender<Vec<RateRecord>>,
    aggregator: JoinHandle<Vec<RateRecord>>,
) -> FetchResult<Vec<RateRecord>> {
    // Producers hold their own clones; dropping ours lets the channel close
    // once they are done.
    drop(tx);

    let mut first_err: Option<FetchError> = None;
    while let Some(joined) = producers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if first_err.is_none() {
                    first_err = Some(err);
                    producers.abort_all();
                }
            }
            Err(join_err) if join_err.is_cancelled() => {}
            Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
        }
    }

    // All senders are gone now, so the drain below is finite.
    let records = match aggregator.await {
        Ok(records) => records,
        Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
    };

    match first_err {
        Some(err) => Err(err),
        None => Ok(records),
    }
}
