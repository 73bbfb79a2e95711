//! Two-tier thumbnail cache.
//!
//! Real thumbnails are cached for 30s; placeholders for 5s. A placeholder
//! usually means "not ready yet" (device still slicing a fresh upload) and
//! should be retried soon, while a downloaded image rarely changes.
//!
//! Keys are built from the plate's resolved path and last-modified time,
//! never from the plate ID alone: the device reassigns IDs when files are
//! replaced, and an ID-keyed cache would serve the old image under the
//! reused ID. Lookups for unknown paths are cached too, under a
//! `missing:` key, so deleted files do not trigger a plate list scan on
//! every request.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use super::single_flight::{Fetched, SingleFlightCache, TtlPolicy};
use crate::Result;
use crate::imaging::ImageHelper;
use crate::resolver::PlateResolver;
use crate::telemetry;
use crate::transport::{Request, Transport};
use crate::types::{PlateRecord, normalize_path};

/// Default TTL for downloaded thumbnails.
pub const DEFAULT_THUMBNAIL_TTL: Duration = Duration::from_secs(30);

/// Default TTL for placeholder thumbnails.
pub const DEFAULT_PLACEHOLDER_TTL: Duration = Duration::from_secs(5);

/// Default maximum number of cached thumbnails.
pub const DEFAULT_THUMBNAIL_MAX_ENTRIES: u64 = 256;

/// Named thumbnail size requested by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailSize {
    /// 400×400.
    Small,
    /// 800×480.
    Large,
}

impl ThumbnailSize {
    /// `"Large"` (any case) is [`Large`](Self::Large); every other name,
    /// including unknown ones, is [`Small`](Self::Small).
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("large") {
            ThumbnailSize::Large
        } else {
            ThumbnailSize::Small
        }
    }

    /// Pixel dimensions as `(width, height)`.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ThumbnailSize::Large => (800, 480),
            ThumbnailSize::Small => (400, 400),
        }
    }
}

/// Cache key for a resolved plate at the given size.
pub fn thumbnail_key(plate: &PlateRecord, width: u32, height: u32) -> String {
    format!("{}|{width}|{height}", plate.stable_id())
}

/// Cache key recording that no plate matched `path`.
pub fn missing_key(path: &str, width: u32, height: u32) -> String {
    format!("missing:{}|{width}|{height}", normalize_path(path))
}

/// Path of a plate's 3D preview image.
pub fn preview_path(plate_id: i64) -> String {
    format!("/static/plates/{plate_id}/3d.png")
}

/// Thumbnail cache keyed by stable plate identity.
pub struct ThumbnailCache {
    cache: SingleFlightCache<String, Bytes>,
    transport: Arc<dyn Transport>,
    resolver: PlateResolver,
    images: Arc<dyn ImageHelper>,
}

impl ThumbnailCache {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: PlateResolver,
        images: Arc<dyn ImageHelper>,
        policy: TtlPolicy,
        max_entries: u64,
    ) -> Self {
        Self {
            cache: SingleFlightCache::new("thumbnails", policy, max_entries),
            transport,
            resolver,
            images,
        }
    }

    /// Thumbnail bytes for `file_path`. Never fails; degrades to a
    /// placeholder of the requested size.
    pub async fn get_thumbnail(&self, file_path: &str, size: ThumbnailSize) -> Bytes {
        let (width, height) = size.dimensions();

        let missing = missing_key(file_path, width, height);
        if let Some(bytes) = self.cache.peek(&missing) {
            return bytes;
        }

        let Some(plate) = self.resolver.find_by_path(file_path).await else {
            debug!(path = file_path, "no plate for thumbnail, serving placeholder");
            return self.cached_placeholder(missing, width, height).await;
        };

        let key = thumbnail_key(&plate, width, height);
        let transport = Arc::clone(&self.transport);
        let images = Arc::clone(&self.images);
        match self
            .cache
            .get(key, false, move || {
                download(transport, images, plate, width, height)
            })
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = file_path, error = %e, "thumbnail fetch task failed");
                self.images.generate_placeholder(width, height)
            }
        }
    }

    async fn cached_placeholder(&self, key: String, width: u32, height: u32) -> Bytes {
        let images = Arc::clone(&self.images);
        let fetched = self
            .cache
            .get(key, false, move || async move {
                metrics::counter!(telemetry::PLACEHOLDERS_TOTAL, "reason" => "missing").increment(1);
                Ok(Fetched::placeholder(images.generate_placeholder(width, height)))
            })
            .await;
        fetched.unwrap_or_else(|_| self.images.generate_placeholder(width, height))
    }

    /// Drop every cached thumbnail and placeholder.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Underlying cache, for inspection.
    pub fn cache(&self) -> &SingleFlightCache<String, Bytes> {
        &self.cache
    }
}

async fn download(
    transport: Arc<dyn Transport>,
    images: Arc<dyn ImageHelper>,
    plate: PlateRecord,
    width: u32,
    height: u32,
) -> Result<Fetched<Bytes>> {
    let placeholder = |reason: &'static str| -> Result<Fetched<Bytes>> {
        metrics::counter!(telemetry::PLACEHOLDERS_TOTAL, "reason" => reason).increment(1);
        Ok(Fetched::placeholder(images.generate_placeholder(width, height)))
    };

    let plate_id = match plate.plate_id {
        Some(id) if plate.preview => id,
        _ => {
            debug!(path = %plate.path, "plate has no preview yet");
            return placeholder("no_preview");
        }
    };

    match transport.send(Request::get(preview_path(plate_id))).await {
        Ok(response) if response.is_success() && !response.body.is_empty() => {
            Ok(Fetched::value(response.body))
        }
        Ok(response) => {
            debug!(plate_id, status = response.status, "preview download returned no image");
            placeholder("download_failed")
        }
        Err(e) => {
            debug!(plate_id, error = %e, "preview download failed");
            placeholder("download_failed")
        }
    }
}
