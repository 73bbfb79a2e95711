//! Plate resolution by ID or path.
//!
//! Status payloads often carry only a numeric plate ID. Turning that into
//! a [`PlateRecord`] needs the plate list, which must never slow down a
//! status poll. [`PlateResolver::resolve`] therefore only answers from a
//! "last resolved" slot, and schedules a detached background lookup when
//! the slot is stale. The lookup's result benefits the next poll.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::{PlateList, PlateListCache};
use crate::telemetry;
use crate::types::PlateRecord;

/// Default minimum adapter age before background resolution is allowed.
///
/// Freshly started clients poll status immediately; skipping resolution
/// for the first moments keeps cold starts cheap. The exact value is a
/// tuning knob.
pub const DEFAULT_STARTUP_GUARD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct ResolvedSlot {
    plate_id: i64,
    record: PlateRecord,
    resolved_at: Instant,
}

#[derive(Default)]
struct SlotState {
    last: Option<ResolvedSlot>,
    /// Plate ID a background lookup is currently running for.
    pending: Option<i64>,
}

/// Resolves plate IDs and paths to [`PlateRecord`]s.
///
/// Cheap to clone; clones share the slot and the plate list cache.
#[derive(Clone)]
pub struct PlateResolver {
    plates: Arc<PlateListCache>,
    state: Arc<Mutex<SlotState>>,
    created_at: Instant,
    startup_guard: Duration,
}

impl PlateResolver {
    pub fn new(plates: Arc<PlateListCache>) -> Self {
        Self::with_startup_guard(plates, DEFAULT_STARTUP_GUARD)
    }

    pub fn with_startup_guard(plates: Arc<PlateListCache>, startup_guard: Duration) -> Self {
        Self {
            plates,
            state: Arc::new(Mutex::new(SlotState::default())),
            created_at: Instant::now(),
            startup_guard,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record for `plate_id`, if already resolved and still fresh.
    ///
    /// Never waits on the network. On a miss, and only while the device is
    /// `printing` and the adapter is past its startup guard, a background
    /// lookup is scheduled so a later call can answer.
    pub fn resolve(&self, plate_id: i64, printing: bool) -> Option<PlateRecord> {
        let ttl = self.plates.ttl();
        let mut state = self.lock_state();

        if let Some(slot) = &state.last {
            if slot.plate_id == plate_id && slot.resolved_at.elapsed() < ttl {
                return Some(slot.record.clone());
            }
        }

        if !printing {
            return None;
        }
        if self.created_at.elapsed() < self.startup_guard {
            debug!(plate_id, "skipping plate resolution during startup");
            return None;
        }
        if state.pending == Some(plate_id) {
            return None;
        }

        state.pending = Some(plate_id);
        drop(state);
        self.spawn_resolution(plate_id);
        None
    }

    fn spawn_resolution(&self, plate_id: i64) {
        let resolver = self.clone();
        tokio::spawn(async move {
            let plates = resolver.plates.get(false).await;
            let found = find_by_id(&plates, plate_id).cloned();

            let mut state = resolver.lock_state();
            if state.pending == Some(plate_id) {
                state.pending = None;
            }
            match found {
                Some(record) => {
                    debug!(plate_id, name = %record.name, "resolved plate in background");
                    metrics::counter!(telemetry::PLATE_RESOLUTIONS_TOTAL, "status" => "ok")
                        .increment(1);
                    state.last = Some(ResolvedSlot {
                        plate_id,
                        record,
                        resolved_at: Instant::now(),
                    });
                }
                None => {
                    debug!(plate_id, "plate not found in plate list");
                    metrics::counter!(telemetry::PLATE_RESOLUTIONS_TOTAL, "status" => "not_found")
                        .increment(1);
                }
            }
        });
    }

    /// Whether a background lookup is currently running.
    pub fn is_resolving(&self) -> bool {
        self.lock_state().pending.is_some()
    }

    /// Find the plate whose path or name matches `file_path`.
    ///
    /// Uses the cached plate list when fresh, fetching it otherwise.
    pub async fn find_by_path(&self, file_path: &str) -> Option<PlateRecord> {
        let plates = self.plates.get(false).await;
        find_by_path(&plates, file_path).cloned()
    }

    /// Find the plate with the given numeric ID, awaiting the plate list.
    pub async fn find_by_id(&self, plate_id: i64) -> Option<PlateRecord> {
        let plates = self.plates.get(false).await;
        find_by_id(&plates, plate_id).cloned()
    }

    /// Forget the last resolved plate.
    pub fn clear(&self) {
        self.lock_state().last = None;
    }
}

/// First plate in `plates` matching `path` (see [`PlateRecord::matches_path`]).
pub fn find_by_path<'a>(plates: &'a PlateList, path: &str) -> Option<&'a PlateRecord> {
    plates.iter().find(|p| p.matches_path(path))
}

/// First plate in `plates` with the given ID.
pub fn find_by_id(plates: &PlateList, plate_id: i64) -> Option<&PlateRecord> {
    plates.iter().find(|p| p.plate_id == Some(plate_id))
}
