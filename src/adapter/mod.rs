//! Adapter facade
//!
//! [`NanoDlpAdapter`] owns every cache for one device session. Build one
//! per backend and share it; the caches are meaningless across devices.

mod builder;
mod commands;

pub use builder::NanoDlpAdapterBuilder;
pub use commands::ZDirection;

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use crate::Result;
use crate::cache::{PlateList, PlateListCache, ThumbnailCache, ThumbnailSize};
use crate::config::AdapterConfig;
use crate::imaging::{ImageHelper, LAYER_PREVIEW_MAX};
use crate::resolver::PlateResolver;
use crate::status::{StatusMap, StatusPoller};
use crate::telemetry;
use crate::transport::{Request, Transport};
use crate::types::PlateRecord;

/// Files and child directories directly under one directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryListing {
    pub files: Vec<PlateRecord>,
    /// Names of immediate child directories, sorted.
    pub directories: Vec<String>,
}

/// Caching front end for one NanoDLP device.
pub struct NanoDlpAdapter {
    transport: Arc<dyn Transport>,
    plates: Arc<PlateListCache>,
    resolver: PlateResolver,
    thumbnails: ThumbnailCache,
    poller: StatusPoller,
    images: Arc<dyn ImageHelper>,
    config: AdapterConfig,
}

impl NanoDlpAdapter {
    /// Create a builder for the device at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> NanoDlpAdapterBuilder {
        NanoDlpAdapterBuilder::new(base_url)
    }

    /// Build an adapter with default collaborators from a loaded config.
    pub fn from_config(config: AdapterConfig) -> Result<Self> {
        NanoDlpAdapterBuilder::from_config(config).build()
    }

    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        plates: Arc<PlateListCache>,
        resolver: PlateResolver,
        thumbnails: ThumbnailCache,
        poller: StatusPoller,
        images: Arc<dyn ImageHelper>,
        config: AdapterConfig,
    ) -> Self {
        Self {
            transport,
            plates,
            resolver,
            thumbnails,
            poller,
            images,
            config,
        }
    }

    /// Configuration the adapter was built with.
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Poll the device once. See [`StatusPoller::get_status`].
    pub async fn get_status(&self) -> Result<StatusMap> {
        self.poller.get_status().await
    }

    /// Thumbnail for a file path. Never fails; see [`ThumbnailCache`].
    pub async fn get_file_thumbnail(&self, file_path: &str, size: ThumbnailSize) -> Bytes {
        self.thumbnails.get_thumbnail(file_path, size).await
    }

    /// Rendered layer image, resized for display.
    ///
    /// Not cached. Any failure degrades to an 800×480 placeholder.
    pub async fn get_plate_layer_image(&self, plate_id: i64, layer: u32) -> Bytes {
        let path = format!("/static/plates/{plate_id}/{layer}.png");
        match self.transport.send(Request::get(path)).await {
            Ok(response) if response.is_success() && !response.body.is_empty() => {
                self.images.resize_layer_2d(response.body)
            }
            Ok(response) => {
                debug!(plate_id, layer, status = response.status, "layer image unavailable");
                self.layer_placeholder()
            }
            Err(e) => {
                debug!(plate_id, layer, error = %e, "layer image fetch failed");
                self.layer_placeholder()
            }
        }
    }

    fn layer_placeholder(&self) -> Bytes {
        metrics::counter!(telemetry::PLACEHOLDERS_TOTAL, "reason" => "layer").increment(1);
        let (width, height) = LAYER_PREVIEW_MAX;
        self.images.generate_placeholder(width, height)
    }

    /// Plates directly under `subdirectory` plus its child directories.
    ///
    /// An empty `subdirectory` lists the root.
    pub async fn list_items(&self, subdirectory: &str) -> DirectoryListing {
        let plates = self.plates.get(false).await;
        list_directory(&plates, subdirectory)
    }

    /// Plate whose path matches `file_path`, from the cached list.
    pub async fn find_plate_by_path(&self, file_path: &str) -> Option<PlateRecord> {
        self.resolver.find_by_path(file_path).await
    }

    /// Current plate list, optionally bypassing the cache.
    pub async fn plates(&self, force_refresh: bool) -> PlateList {
        self.plates.get(force_refresh).await
    }

    /// Drop every cached plate list, thumbnail and resolved plate.
    pub fn invalidate_caches(&self) {
        self.plates.invalidate();
        self.thumbnails.invalidate_all();
        self.resolver.clear();
    }

    /// Device notifications. Empty on any failure.
    pub async fn notifications(&self) -> Vec<Value> {
        match self.fetch_json("/notification").await {
            Some(Value::Array(items)) => items,
            Some(Value::Object(mut map)) => match map.remove("notifications") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Analytics series `n`. `Null` on any failure.
    pub async fn analytic_data(&self, n: u32) -> Value {
        self.fetch_json(&format!("/analytic/data/{n}"))
            .await
            .unwrap_or(Value::Null)
    }

    /// Latest value of analytics metric `id`.
    ///
    /// The device answers with a bare number, sometimes quoted.
    pub async fn analytic_value(&self, id: u32) -> Option<f64> {
        let response = self
            .best_effort(&format!("/analytic/value/{id}"))
            .await?;
        response.text().trim().trim_matches('"').parse().ok()
    }

    async fn fetch_json(&self, path: &str) -> Option<Value> {
        let response = self.best_effort(path).await?;
        match response.json() {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(path, error = %e, "ignoring undecodable response");
                None
            }
        }
    }

    async fn best_effort(&self, path: &str) -> Option<crate::transport::Response> {
        let result = self
            .transport
            .send(Request::get(path))
            .await
            .and_then(|response| response.error_for_status());
        match result {
            Ok(response) => Some(response),
            Err(e) => {
                debug!(path, error = %e, "auxiliary request failed");
                None
            }
        }
    }
}

/// Split a plate list into the files and child directories of `subdirectory`.
pub fn list_directory(plates: &[PlateRecord], subdirectory: &str) -> DirectoryListing {
    let prefix = subdirectory.trim_matches('/');
    let mut files = Vec::new();
    let mut directories = BTreeSet::new();

    for plate in plates {
        let path = plate.path.trim_start_matches('/');
        let rest = if prefix.is_empty() {
            path
        } else {
            match path
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('/'))
            {
                Some(rest) => rest,
                None => continue,
            }
        };
        match rest.split_once('/') {
            Some((dir, _)) if !dir.is_empty() => {
                directories.insert(dir.to_string());
            }
            Some(_) => {}
            None if !rest.is_empty() => files.push(plate.clone()),
            None => {}
        }
    }

    DirectoryListing {
        files,
        directories: directories.into_iter().collect(),
    }
}
