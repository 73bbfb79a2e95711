//! Domain types parsed from device payloads.

pub mod json;
pub mod plate;
pub mod status;

pub use plate::{PLATE_ID_KEYS, PlateRecord, normalize_path};
pub use status::{OVERSIZED_STATUS_FIELDS, StatusPayload, StatusSnapshot};
