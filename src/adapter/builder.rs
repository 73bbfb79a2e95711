//! Builder for configuring adapter instances

use std::sync::Arc;
use std::time::Duration;

use super::NanoDlpAdapter;
use crate::Result;
use crate::cache::{PlateListCache, ThumbnailCache, TtlPolicy};
use crate::config::AdapterConfig;
use crate::imaging::{DefaultImageHelper, ImageHelper};
use crate::resolver::PlateResolver;
use crate::retry::RetryConfig;
use crate::status::{NanoDlpStateMachine, StateCanonicalizer, StatusPoller};
use crate::transport::{ReqwestTransport, TimeoutTransport, Transport};

/// Builder for [`NanoDlpAdapter`].
///
/// Every collaborator has a default: a reqwest transport against the
/// configured base URL, [`NanoDlpStateMachine`] and [`DefaultImageHelper`].
pub struct NanoDlpAdapterBuilder {
    config: AdapterConfig,
    retry: Option<RetryConfig>,
    transport: Option<Arc<dyn Transport>>,
    canonicalizer: Option<Arc<dyn StateCanonicalizer>>,
    images: Option<Arc<dyn ImageHelper>>,
}

impl NanoDlpAdapterBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_config(AdapterConfig::new(base_url))
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: AdapterConfig) -> Self {
        Self {
            config,
            retry: None,
            transport: None,
            canonicalizer: None,
            images: None,
        }
    }

    /// Use a custom transport instead of reqwest.
    ///
    /// It is still wrapped in a [`TimeoutTransport`] with the configured
    /// request timeout.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a custom state canonicalizer.
    pub fn canonicalizer(mut self, canonicalizer: impl StateCanonicalizer + 'static) -> Self {
        self.canonicalizer = Some(Arc::new(canonicalizer));
        self
    }

    /// Use a custom image helper for placeholders and layer resizing.
    pub fn image_helper(mut self, images: impl ImageHelper + 'static) -> Self {
        self.images = Some(Arc::new(images));
        self
    }

    /// Set the per-request timeout (default: 5s).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.request_timeout(timeout);
        self
    }

    /// Set the plate list TTL (default: 120s).
    pub fn plate_list_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache = self.config.cache.plate_list_ttl(ttl);
        self
    }

    /// Set TTLs for downloaded and placeholder thumbnails (default: 30s / 5s).
    pub fn thumbnail_ttls(mut self, fresh: Duration, placeholder: Duration) -> Self {
        self.config.cache = self
            .config
            .cache
            .thumbnail_ttl(fresh)
            .placeholder_ttl(placeholder);
        self
    }

    /// Set how long after startup plate resolution is skipped (default: 2s).
    pub fn startup_guard(mut self, guard: Duration) -> Self {
        self.config.status = self.config.status.startup_guard(guard);
        self
    }

    /// Override the status retry policy.
    ///
    /// Takes precedence over the `[status]` retry settings.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Build the adapter.
    pub fn build(self) -> Result<NanoDlpAdapter> {
        let config = self.config;
        config.validate()?;

        let timeout = config.request_timeout_duration();
        let transport: Arc<dyn Transport> = match self.transport {
            Some(inner) => Arc::new(TimeoutTransport::with_timeout(inner, timeout)),
            None => Arc::new(TimeoutTransport::with_timeout(
                ReqwestTransport::new(config.base_url.clone())?,
                timeout,
            )),
        };
        let canonicalizer = self
            .canonicalizer
            .unwrap_or_else(|| Arc::new(NanoDlpStateMachine::new()));
        let images = self
            .images
            .unwrap_or_else(|| Arc::new(DefaultImageHelper));
        let retry = self.retry.unwrap_or_else(|| config.status.retry());

        let plates = Arc::new(PlateListCache::with_ttl(
            Arc::clone(&transport),
            config.cache.plate_list_ttl_duration(),
        ));
        let resolver = PlateResolver::with_startup_guard(
            Arc::clone(&plates),
            config.status.startup_guard_duration(),
        );
        let thumbnails = ThumbnailCache::new(
            Arc::clone(&transport),
            resolver.clone(),
            Arc::clone(&images),
            TtlPolicy::two_tier(
                config.cache.thumbnail_ttl_duration(),
                config.cache.placeholder_ttl_duration(),
            ),
            config.cache.thumbnail_max_entries,
        );
        let poller = StatusPoller::new(
            Arc::clone(&transport),
            resolver.clone(),
            canonicalizer,
            retry,
        );

        Ok(NanoDlpAdapter::new(
            transport, plates, resolver, thumbnails, poller, images, config,
        ))
    }
}
