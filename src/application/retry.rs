//! Bounded retries with exponential backoff

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::shared::errors::{RetryError, Retryable};

pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Retries an operation while its errors are retryable.
///
/// The wait after attempt `n` is `base_delay * 2^(n-1)`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Wait after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently or the attempt
    /// budget is spent. `what` names the operation in logs.
    pub async fn execute<T, E, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::error::Error + 'static,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}/{}", what, attempt, max_attempts);
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    warn!("{} failed permanently on attempt {}: {}", what, attempt, err);
                    return Err(RetryError::Permanent(err));
                }
                Err(err) if attempt >= max_attempts => {
                    warn!("{}: all {} attempts failed, last error: {}", what, attempt, err);
                    return Err(RetryError::Exhausted { attempts: attempt, last: err });
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        what, attempt, max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
