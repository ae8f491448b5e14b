//! Fetch engine — bounded-concurrency resolution with retries.
//!
//! - [`Downloader`] owns the admission gate (a counting semaphore sized by
//!   `max_concurrent_requests`) and hands every admitted item to its own task.
//! - [`task`] runs one item through the retry loop and reports its outcome.
//!
//! Outcomes travel back over a single bounded mpsc channel as [`FetchEvent`]s:
//! for each item a `Finished` event, then exactly one `Success` or `Failure`.
//! An item keeps its gate slot until its success is queued, so a slow consumer
//! stalls admission instead of piling fetched content up in memory. The channel
//! closes once the `Downloader` and every item task are gone.

mod task;


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Semaphore, mpsc};

use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::resolver::AssetSource;
use crate::types::{AssetRef, FetchEvent, WorkItem};

use task::ItemContext;

/// Live count of resolutions in progress, with its high-water mark
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    /// Mark one resolution as started; it ends when the guard drops.
    pub(crate) fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }
}

pub(crate) struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Concurrent fetch engine
pub struct Downloader {
    source: Arc<dyn AssetSource>,
    /// Admission gate; one permit per resolution in flight
    gate: Arc<Semaphore>,
    retry: Arc<RetryConfig>,
    event_tx: mpsc::Sender<FetchEvent>,
    in_flight: Arc<InFlight>,
}

impl Downloader {
    /// Create an engine and the receiving end of its outcome channel
    pub fn new(
        source: Arc<dyn AssetSource>,
        config: &Config,
    ) -> (Self, mpsc::Receiver<FetchEvent>) {
        let permits = config.network.max_concurrent_requests.max(1);
        // Room for the Finished/outcome pair of every slot
        let (event_tx, event_rx) = mpsc::channel(permits.saturating_mul(2));

        let downloader = Self {
            source,
            gate: Arc::new(Semaphore::new(permits)),
            retry: Arc::new(config.retry.clone()),
            event_tx,
            in_flight: Arc::new(InFlight::default()),
        };
        (downloader, event_rx)
    }

    /// Admit `target` at `version` for processing
    ///
    /// Waits until the gate has a free slot, then starts the item in the
    /// background and returns; the caller may immediately submit the next item.
    pub async fn enqueue(&self, target: AssetRef, version: u32) -> Result<()> {
        let permit = Arc::clone(&self.gate)
            .acquire_owned()
            .await
            .map_err(|_| Error::GateClosed)?;

        let ctx = ItemContext {
            source: Arc::clone(&self.source),
            gate: Arc::clone(&self.gate),
            retry: Arc::clone(&self.retry),
            event_tx: self.event_tx.clone(),
            in_flight: Arc::clone(&self.in_flight),
        };
        let item = WorkItem::new(target, version);
        tracing::trace!(asset = %item.key(), "admitted");

        tokio::spawn(task::run_item(ctx, item, permit));
        Ok(())
    }

    /// Resolutions currently in progress
    pub fn in_flight(&self) -> usize {
        self.in_flight.current.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous resolutions observed so far
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak.load(Ordering::SeqCst)
    }

    /// Free admission slots
    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }
}
