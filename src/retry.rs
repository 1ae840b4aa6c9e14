//! Retry logic with exponential backoff
//!
//! This module provides configurable retry logic for rate-limited requests.
//! It implements exponential backoff with optional jitter to spread out
//! concurrent workers that were throttled at the same moment.
//!
//! # Example
//!
//! ```no_run
//! use mail_archiver::retry::{IsRetryable, retry_with_backoff};
//! use mail_archiver::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Throttled,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Throttled)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let outcome = retry_with_backoff(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! })
//! .await;
//! outcome.result?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::ServiceError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Throttling signals should return `true`. Everything else (not found,
/// rejected credentials, malformed responses) should return `false`.
pub trait IsRetryable {
    /// Returns true if the operation should be retried after a backoff
    fn is_retryable(&self) -> bool;
}

/// Only the rate-limit signal is worth waiting out
impl IsRetryable for ServiceError {
    fn is_retryable(&self) -> bool {
        self.is_rate_limited()
    }
}

/// Result of [`retry_with_backoff`] together with the number of retries spent
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result of the operation
    pub result: Result<T, E>,
    /// Retries performed after the first call
    pub retries: u32,
}

impl<T, E: IsRetryable> RetryOutcome<T, E> {
    /// Whether the operation failed because the retry budget ran out
    pub fn exhausted(&self) -> bool {
        matches!(&self.result, Err(e) if e.is_retryable())
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// The operation is called once, then retried up to `config.max_attempts` times
/// while it fails with a retryable error. The delay before retry `n` is
/// `initial_delay * backoff_multiplier^(n-1)`, capped at `max_delay`.
///
/// # Example
///
/// ```no_run
/// use mail_archiver::retry::retry_with_backoff;
/// use mail_archiver::config::RetryConfig;
/// use mail_archiver::error::ServiceError;
///
/// # async fn example() -> Result<(), ServiceError> {
/// let config = RetryConfig::default();
/// let outcome = retry_with_backoff(&config, || async {
///     Ok::<String, ServiceError>("raw message".to_string())
/// })
/// .await;
/// let _raw = outcome.result?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay.min(config.max_delay);

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(result),
                    retries: attempt,
                };
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::time::sleep(jittered_delay).await;

                delay = Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
                    .unwrap_or(config.max_delay)
                    .min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return RetryOutcome {
                    result: Err(e),
                    retries: attempt,
                };
            }
        }
    }
}

/// Add random jitter to a delay
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay lands between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
