//! Telemetry metric name constants.
//!
//! Centralised metric names for adapter operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `nanodlp_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `cache`: cache name ("plates", "thumbnails")
//! - `status`: outcome: "ok" or "error"
//! - `reason`: why a placeholder was served

/// Cache lookups answered from a fresh entry.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "nanodlp_cache_hits_total";

/// Cache lookups that found no fresh entry.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "nanodlp_cache_misses_total";

/// Callers that joined a fetch already in flight instead of starting one.
///
/// Labels: `cache`.
pub const CACHE_COALESCED_TOTAL: &str = "nanodlp_cache_coalesced_total";

/// Underlying fetches started by a cache.
///
/// Labels: `cache`, `status` ("ok" | "error").
pub const CACHE_FETCHES_TOTAL: &str = "nanodlp_cache_fetches_total";

/// Placeholder images handed out instead of a real thumbnail.
///
/// Labels: `reason` ("missing" | "no_preview" | "download_failed" | "layer").
pub const PLACEHOLDERS_TOTAL: &str = "nanodlp_placeholders_total";

/// Status poll retries (not counting the initial request).
pub const STATUS_RETRIES_TOTAL: &str = "nanodlp_status_retries_total";

/// Status poll duration in seconds, retries included.
pub const STATUS_POLL_DURATION_SECONDS: &str = "nanodlp_status_poll_duration_seconds";

/// Background plate resolutions.
///
/// Labels: `status` ("ok" | "not_found").
pub const PLATE_RESOLUTIONS_TOTAL: &str = "nanodlp_plate_resolutions_total";
