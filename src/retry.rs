//! Retry configuration and the shared retry helper.
//!
//! The status poll is the only operation that retries on its own; every
//! other caller either degrades (caches) or surfaces the error (commands).

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::telemetry;
use crate::{AdapterError, Result};

/// Configuration for retrying transient errors with a fixed backoff.
///
/// ```rust
/// # use nanodlp_adapter::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(3)
///     .delay(Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 2.
    pub max_attempts: u32,
    /// Fixed delay between attempts. Default: 200ms.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_millis(200),
        }
    }
}

impl RetryConfig {
    /// Create a config that retries once after 200ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the delay between attempts.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Execute an async operation with retry logic.
///
/// Retries transient errors (see [`AdapterError::is_transient()`]) up to
/// `config.max_attempts`, sleeping `config.delay` in between. Permanent
/// errors are returned immediately. The last transient error is returned
/// once attempts run out.
pub(crate) async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                if attempt + 1 < attempts {
                    metrics::counter!(telemetry::STATUS_RETRIES_TOTAL).increment(1);
                    debug!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = config.delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(config.delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| AdapterError::Http(format!("{operation}: no attempt made"))))
}
