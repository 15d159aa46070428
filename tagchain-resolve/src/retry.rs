//! Exponential-backoff retry around one logical upstream call
//!
//! Every attempt first takes a slot from the service's [`RateLimiter`], so
//! retries spend the same rate budget as first attempts. Classification is
//! delegated to [`ResolveError::is_retryable`].

use crate::error::{ResolveError, ResolveResult};
use crate::rate_limiter::RateLimiter;
use std::future::Future;
use std::time::Duration;

/// Retry parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before 0-indexed `attempt`: zero for the first, then
    /// `base_delay * 2^(attempt-1)`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails terminally, or attempts run out.
    ///
    /// # Errors
    /// - Terminal classifications are returned unchanged after one attempt
    /// - Retryable failures on the final attempt become
    ///   [`ResolveError::RetriesExhausted`] naming the attempt count
    pub async fn execute<T, F, Fut>(
        &self,
        limiter: &RateLimiter,
        mut operation: F,
    ) -> ResolveResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ResolveResult<T>>,
    {
        let service = limiter.service();
        let mut attempt = 0u32;

        loop {
            if attempt > 0 {
                let delay = self.backoff_for(attempt);
                tracing::debug!(
                    service,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            limiter.wait_for_slot().await;

            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(service, attempt, "Upstream call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    if attempt >= self.max_retries {
                        tracing::error!(
                            service,
                            attempts = attempt + 1,
                            error = %err,
                            "Upstream call failed: retries exhausted"
                        );
                        return Err(ResolveError::RetriesExhausted {
                            service,
                            attempts: attempt + 1,
                            last: Box::new(err),
                        });
                    }

                    tracing::warn!(
                        service,
                        attempt,
                        error = %err,
                        "Retryable upstream failure, will retry"
                    );
                    attempt += 1;
                }
            }
        }
    }
}
