//! Retry Logic
//!
//! Bounded fixed-delay retry for calls to the LWA token endpoint and the event gateway.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SmartHomeError;

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        DEFAULT_RETRY_CONFIG
    }
}

impl RetryConfig {
    /// Create a retry configuration with the given bound and delay.
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }
}

/// Alexa asks for at most three resends, at least one second apart.
pub const DEFAULT_RETRY_CONFIG: RetryConfig = RetryConfig {
    max_retries: 3,
    retry_delay: Duration::from_secs(1),
};

/// Retry policy that re-runs an operation while it fails with a transient error.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Get the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation, retrying transient failures.
    ///
    /// Non-retryable errors are returned immediately. Once the bound is exhausted the
    /// last error is returned unchanged.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, SmartHomeError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SmartHomeError>>,
    {
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if retries > 0 {
                        debug!(retries, "Operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(error) if error.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    debug!(
                        retry = retries,
                        max_retries = self.config.max_retries,
                        delay_ms = self.config.retry_delay.as_millis() as u64,
                        error = %error,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(error) => {
                    if retries > 0 {
                        warn!(
                            retries,
                            error = %error,
                            "Operation failed after all retries"
                        );
                    }
                    return Err(error);
                }
            }
        }
    }
}
