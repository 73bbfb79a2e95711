//! Fixed-timeout decorator for any [`Transport`].

use std::time::Duration;

use async_trait::async_trait;

use super::{Request, Response, Transport};
use crate::{AdapterError, Result};

/// Default bound on a single device request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Decorator that bounds every request by a fixed timeout.
///
/// On expiry the request fails with [`AdapterError::Timeout`]. Nothing is
/// logged here: during a sustained outage the status poll would otherwise
/// log every two seconds, and the poller already owns user-visible
/// reporting.
pub struct TimeoutTransport<T> {
    inner: T,
    timeout: Duration,
}

impl<T: Transport> TimeoutTransport<T> {
    /// Wrap `inner` with [`DEFAULT_TIMEOUT`].
    pub fn new(inner: T) -> Self {
        Self::with_timeout(inner, DEFAULT_TIMEOUT)
    }

    /// Wrap `inner` with a custom timeout.
    pub fn with_timeout(inner: T, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<T: Transport> Transport for TimeoutTransport<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        match tokio::time::timeout(self.timeout, self.inner.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout(self.timeout)),
        }
    }
}
