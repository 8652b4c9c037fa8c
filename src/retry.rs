//! Bounded retry with exponential backoff for upstream calls.
//!
//! Store reads/writes and completion calls share one policy. Only errors that report
//! themselves as transient are retried; everything else surfaces on the first attempt. The
//! wait before retry `n` is `backoff * 2^(n-1)`, so the defaults (250 ms, 2 retries) add at
//! most 750 ms to a failing request.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::Config;

/// Errors that can tell the retry loop whether another attempt is worthwhile.
pub trait Transient {
    /// `true` when the failure is likely to clear on its own (network fault, 429, 5xx).
    fn is_transient(&self) -> bool;
}

/// Retry policy applied to upstream operations.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries attempted after the initial call.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each later one.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Build the policy from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.upstream_max_retries,
            backoff: Duration::from_millis(config.upstream_retry_backoff_ms),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails permanently, or the retry budget is spent.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Upstream call failed; retrying"
                    );
                    sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
