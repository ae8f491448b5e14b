//! Retry logic with exponential backoff
//!
//! Transient resolution failures are retried in a loop (never by resubmitting
//! recursively) up to [`RetryConfig::max_retries`] times, so an item is attempted
//! at most `max_retries + 1` times. Permanent failures (locked or inaccessible
//! assets) stop immediately.
//!
//! # Example
//!
//! ```no_run
//! use asset_scraper::retry::{IsRetryable, run_with_retry};
//! use asset_scraper::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let result = run_with_retry(&config, |_attempt| async {
//!     Ok::<_, MyError>(())
//! })
//! .await;
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::ResolveError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, 5xx, dropped connections) should return `true`.
/// Permanent failures (locked, inaccessible) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ResolveError {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport errors: timeouts, refused connections and truncated bodies
            // are transient; a builder or redirect error will fail the same way again
            ResolveError::Request { source, .. } => {
                source.is_timeout()
                    || source.is_connect()
                    || source.is_body()
                    || source.is_request()
                    || source.status().is_some_and(|s| s.is_server_error())
            }
            ResolveError::Status { .. } => true,
            ResolveError::MissingHeader { .. } | ResolveError::InvalidHeader { .. } => true,
            ResolveError::NotAccessible { .. } | ResolveError::Locked { .. } => false,
        }
    }
}

/// Terminal failure of [`run_with_retry`]
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// The last error observed
    pub error: E,
    /// Attempts made, including the first
    pub attempts: u32,
}

impl<E: IsRetryable> RetryFailure<E> {
    /// True when the loop stopped because the retry budget ran out
    pub fn exhausted(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Delay to wait before retry number `retry` (1-based)
///
/// `initial_delay * backoff_multiplier^(retry - 1)`, capped at `max_delay`.
/// Jitter is not included; see [`run_with_retry`].
pub fn backoff_delay(config: &RetryConfig, retry: u32) -> Duration {
    if config.initial_delay.is_zero() || retry == 0 {
        return Duration::ZERO;
    }
    let exponent = (retry - 1).min(i32::MAX as u32) as i32;
    let secs = config.initial_delay.as_secs_f64() * config.backoff_multiplier.powi(exponent);
    if !secs.is_finite() || secs >= config.max_delay.as_secs_f64() {
        return config.max_delay;
    }
    Duration::from_secs_f64(secs)
}

/// Execute an async operation, retrying transient failures
///
/// `operation` receives the zero-based attempt number. Between attempts the loop
/// sleeps for [`backoff_delay`] (jittered when enabled, never above `max_delay`).
///
/// # Returns
///
/// The first successful result, or the last error together with the number of
/// attempts made once the error is permanent or the retry budget is spent.
pub async fn run_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> std::result::Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = backoff_delay(config, attempt);
                let delay = if config.jitter {
                    add_jitter(delay).min(config.max_delay)
                } else {
                    delay
                };

                tracing::warn!(
                    error = %e,
                    retry = attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying"
                );

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => {
                return Err(RetryFailure {
                    error: e,
                    attempts: attempt + 1,
                });
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
