//! Cache for the device's plate list.
//!
//! The plate list changes rarely (only when files are uploaded, deleted or
//! a print starts), while status is polled every ~2s. Caching the list for
//! two minutes keeps plate lookups off the network in the common case.
//!
//! This cache never fails: an unreachable device or an unparseable payload
//! yields an empty list (not cached), so status polling keeps working.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::single_flight::{Fetched, SingleFlightCache, TtlPolicy};
use crate::Result;
use crate::transport::{Request, Transport};
use crate::types::PlateRecord;

/// Endpoint listing every plate known to the device.
pub const PLATES_PATH: &str = "/plates/list/json";

/// Default plate list TTL.
pub const DEFAULT_PLATE_LIST_TTL: Duration = Duration::from_secs(120);

/// Wrapper keys the device may nest the list under.
const LIST_KEYS: &[&str] = &["plates", "files", "data"];

/// Shared, immutable snapshot of the plate list.
pub type PlateList = Arc<Vec<PlateRecord>>;

/// Single-flight TTL cache over `GET /plates/list/json`.
pub struct PlateListCache {
    cache: SingleFlightCache<(), PlateList>,
    transport: Arc<dyn Transport>,
}

impl PlateListCache {
    /// Create a cache using [`DEFAULT_PLATE_LIST_TTL`].
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_ttl(transport, DEFAULT_PLATE_LIST_TTL)
    }

    pub fn with_ttl(transport: Arc<dyn Transport>, ttl: Duration) -> Self {
        Self {
            cache: SingleFlightCache::new("plates", TtlPolicy::uniform(ttl), 1),
            transport,
        }
    }

    /// TTL applied to the cached list.
    pub fn ttl(&self) -> Duration {
        self.cache.policy().fresh
    }

    /// Current plate list.
    ///
    /// `force_refresh` drops the cached list first; used right after a
    /// print starts so the newly created plate shows up.
    pub async fn get(&self, force_refresh: bool) -> PlateList {
        let transport = Arc::clone(&self.transport);
        match self
            .cache
            .get((), force_refresh, move || fetch_plates(transport))
            .await
        {
            Ok(plates) => plates,
            Err(e) => {
                warn!(error = %e, "plate list unavailable, using empty list");
                Arc::new(Vec::new())
            }
        }
    }

    /// Cached list if still fresh, without touching the network.
    pub fn cached(&self) -> Option<PlateList> {
        self.cache.peek(&())
    }

    /// Drop the cached list.
    pub fn invalidate(&self) {
        self.cache.invalidate(&());
    }
}

async fn fetch_plates(transport: Arc<dyn Transport>) -> Result<Fetched<PlateList>> {
    let response = transport
        .send(Request::get(PLATES_PATH))
        .await?
        .error_for_status()?;
    let value: Value = response.json()?;
    let plates = parse_plate_list(&value);
    debug!(count = plates.len(), "fetched plate list");
    Ok(Fetched::value(Arc::new(plates)))
}

/// Parse a plate list payload.
///
/// Accepts a bare array, an object wrapping the list under `plates`,
/// `files` or `data`, or a map of plate objects keyed by anything.
/// Entries that are not plate objects are skipped.
pub fn parse_plate_list(value: &Value) -> Vec<PlateRecord> {
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match LIST_KEYS.iter().find_map(|k| map.get(*k)) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(Value::Object(inner)) => inner.values().filter(|v| v.is_object()).collect(),
            _ => map.values().filter(|v| v.is_object()).collect(),
        },
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .filter_map(PlateRecord::from_json)
        .collect()
}
