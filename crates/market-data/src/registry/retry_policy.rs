//! Retry-with-backoff wrapper used around every adapter call.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use crate::errors::{MarketDataError, RetryClass};
use crate::provider::RateLimit;

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max_delay`.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_rate_limit(limit: &RateLimit) -> Self {
        Self::new(limit.max_attempts, limit.base_backoff, limit.max_backoff)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep after the failed `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Run `call` until it succeeds, fails with a non-transient error, or
    /// runs out of attempts. The last error is returned untouched.
    pub async fn run<T, F, Fut>(
        &self,
        provider: &str,
        operation: &str,
        mut call: F,
    ) -> Result<T, MarketDataError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            "'{}' {} succeeded on attempt {}",
                            provider, operation, attempt
                        );
                    }
                    return Ok(value);
                }
                Err(err)
                    if attempt < self.max_attempts
                        && err.retry_class() == RetryClass::WithBackoff =>
                {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        "'{}' {} attempt {}/{} failed: {}. Retrying in {:?}",
                        provider, operation, attempt, self.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_rate_limit(&RateLimit::default())
    }
}
