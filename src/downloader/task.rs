//! Item task — drives one work item from admission to its terminal outcome.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};

use crate::config::RetryConfig;
use crate::error::ResolveError;
use crate::resolver::AssetSource;
use crate::retry::{IsRetryable, RetryFailure, run_with_retry};
use crate::types::{FailureKind, FetchEvent, FetchFailure, FetchSuccess, WorkItem};

use super::InFlight;

/// Shared state an item task needs, cloned from the [`Downloader`](super::Downloader).
pub(super) struct ItemContext {
    pub(super) source: Arc<dyn AssetSource>,
    pub(super) gate: Arc<Semaphore>,
    pub(super) retry: Arc<RetryConfig>,
    pub(super) event_tx: mpsc::Sender<FetchEvent>,
    pub(super) in_flight: Arc<InFlight>,
}

/// Why a single attempt did not produce content.
#[derive(Debug)]
enum AttemptError {
    Resolve(ResolveError),
    /// The gate was closed while waiting to retry
    GateClosed,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Resolve(e) => e.fmt(f),
            AttemptError::GateClosed => f.write_str("admission gate closed before retry"),
        }
    }
}

impl IsRetryable for AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Resolve(e) => e.is_retryable(),
            AttemptError::GateClosed => false,
        }
    }
}

fn failure_kind(failure: &RetryFailure<AttemptError>) -> FailureKind {
    match &failure.error {
        AttemptError::Resolve(ResolveError::Locked { .. }) => FailureKind::Locked,
        AttemptError::Resolve(ResolveError::NotAccessible { .. }) => FailureKind::NotAccessible,
        AttemptError::GateClosed => FailureKind::Cancelled,
        AttemptError::Resolve(_) => FailureKind::RetriesExhausted {
            attempts: failure.attempts,
        },
    }
}

/// Run `item` to completion and emit `Finished` followed by its outcome.
///
/// The first attempt holds the permit granted at admission. Each retry gives its
/// slot back and queues for a fresh one, so retries never hold the gate while
/// backing off and the number of resolutions in flight stays bounded. A
/// successful attempt keeps its permit until the outcome is queued.
pub(super) async fn run_item(
    ctx: ItemContext,
    mut item: WorkItem,
    admitted: OwnedSemaphorePermit,
) {
    let mut admitted = Some(admitted);

    let result = run_with_retry(&ctx.retry, |attempt| {
        item.retry_count = attempt;
        let permit = admitted.take();
        let gate = Arc::clone(&ctx.gate);
        let source = Arc::clone(&ctx.source);
        let in_flight = Arc::clone(&ctx.in_flight);
        let target = item.target.clone();
        let version = item.version;

        async move {
            let permit = match permit {
                Some(permit) => permit,
                None => gate
                    .acquire_owned()
                    .await
                    .map_err(|_| AttemptError::GateClosed)?,
            };
            let _resolving = in_flight.enter();
            let asset = source
                .resolve(&target, version)
                .await
                .map_err(AttemptError::Resolve)?;
            Ok::<_, AttemptError>((asset, permit))
        }
    })
    .await;

    let key = item.key();
    let (outcome, _permit) = match result {
        Ok((asset, permit)) => {
            tracing::debug!(
                asset = %key,
                attempts = item.retry_count + 1,
                size_mb = asset.size_mb,
                "fetched"
            );
            (
                FetchEvent::Success(FetchSuccess {
                    key: key.clone(),
                    asset,
                }),
                Some(permit),
            )
        }
        Err(failure) => {
            let kind = failure_kind(&failure);
            tracing::debug!(
                asset = %key,
                attempts = failure.attempts,
                error = %failure.error,
                "fetch failed"
            );
            (
                FetchEvent::Failure(FetchFailure {
                    key: key.clone(),
                    kind,
                    reason: failure.error.to_string(),
                }),
                None,
            )
        }
    };

    ctx.event_tx.send(FetchEvent::Finished { key }).await.ok();
    if ctx.event_tx.send(outcome).await.is_err() {
        tracing::debug!("outcome receiver dropped before item completed");
    }
}
