//! Fixed-interval retry with an optional attempt bound.

use dgrep_core::{Result, DEFAULT_DIAL_INTERVAL};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// How often, and how many times, to retry a failing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between a failed attempt and the next one
    pub interval: Duration,
    /// Total number of attempts; `None` retries forever
    pub max_attempts: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(DEFAULT_DIAL_INTERVAL)
    }
}

impl RetryPolicy {
    /// Retry forever, waiting `interval` between attempts
    pub const fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    /// Give up after `max_attempts` attempts in total
    pub const fn bounded(interval: Duration, max_attempts: usize) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }

    /// Whether another attempt is allowed after `attempts` have failed
    pub fn allows_another(&self, attempts: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}

/// Execute an operation until it succeeds or the policy runs out of attempts.
///
/// Returns the last error when a bounded policy is exhausted.
pub async fn retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0usize;
    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(attempts, "operation succeeded after retrying");
                }
                return Ok(value);
            }
            Err(error) if policy.allows_another(attempts) => {
                tracing::trace!(
                    attempt = attempts,
                    delay = ?policy.interval,
                    error = %error,
                    "operation failed, retrying"
                );
                sleep(policy.interval).await;
            }
            Err(error) => return Err(error),
        }
    }
}
