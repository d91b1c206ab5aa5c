//! Bounded retry for the cache-miss fetch path
//!
//! A fetch is re-run as a whole when it fails for a transient reason.
//! The default policy makes two attempts with a fixed one second pause.

use crate::config::StockConfig;
use crate::error::{Result, StockError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,

    /// Pause before the second attempt
    pub initial_backoff: Duration,

    /// Ceiling for the pause between attempts
    pub max_backoff: Duration,

    /// Growth factor per attempt (1.0 keeps the delay fixed)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: delay,
            max_backoff: delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Policy derived from the aggregation settings
    pub fn from_config(config: &StockConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay)
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Create a policy with fast retries (for testing)
    pub fn fast() -> Self {
        Self::new(2, Duration::from_millis(5))
    }

    /// Grow the delay geometrically up to `max_backoff`.
    pub fn with_backoff(mut self, multiplier: f64, max_backoff: Duration) -> Self {
        self.backoff_multiplier = multiplier;
        self.max_backoff = max_backoff;
        self
    }

    /// Pause before the given attempt (0-based)
    fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let growth = self.backoff_multiplier.powi((attempt - 1) as i32);
        let delay_ms = self.initial_backoff.as_millis() as f64 * growth;
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_backoff.max(self.initial_backoff))
    }

    /// Execute an async operation, re-running it on retryable failures
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            debug!(
                "Attempt {}/{} for operation: {}",
                attempt + 1,
                attempts,
                operation_name
            );

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name, attempt
                        );
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        debug!(
                            "Operation '{}' failed with non-retryable error: {}",
                            operation_name, e
                        );
                        return Err(e);
                    }

                    if attempt + 1 < attempts {
                        let pause = self.delay_before(attempt + 1);
                        warn!(
                            "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                            operation_name,
                            attempt + 1,
                            attempts,
                            e,
                            pause
                        );
                        sleep(pause).await;
                    }

                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| StockError::Other("Retry failed with no error".to_string()));

        warn!(
            "Operation '{}' failed after {} attempts: {}",
            operation_name, attempts, error
        );

        Err(error)
    }
}
