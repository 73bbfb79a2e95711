//! Caching subsystem.
//!
//! Three layers, all in-memory and process-lifetime only:
//!
//! - [`SingleFlightCache`]: generic TTL cache that coalesces concurrent
//!   misses for a key into one fetch. Entries carry a placeholder flag so
//!   degraded values can expire sooner than real ones (see [`TtlPolicy`]).
//!
//! - [`PlateListCache`]: the device's full plate list under a single key,
//!   120s TTL. A failed fetch yields an empty list that is not cached.
//!
//! - [`ThumbnailCache`]: preview images keyed by resolved path and
//!   last-modified time, 30s for real images and 5s for placeholders.

pub mod plates;
pub mod single_flight;
pub mod thumbnail;

pub use plates::{DEFAULT_PLATE_LIST_TTL, PLATES_PATH, PlateList, PlateListCache, parse_plate_list};
pub use single_flight::{CacheEntry, Fetched, SingleFlightCache, TtlPolicy};
pub use thumbnail::{
    DEFAULT_PLACEHOLDER_TTL, DEFAULT_THUMBNAIL_MAX_ENTRIES, DEFAULT_THUMBNAIL_TTL, ThumbnailCache,
    ThumbnailSize, missing_key, preview_path, thumbnail_key,
};
