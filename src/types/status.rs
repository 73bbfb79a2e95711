//! Status snapshots: one parsed `/status` poll.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Deserialize, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::{Map, Value};

use super::json;
use super::plate::{PLATE_ID_KEYS, PlateRecord};

/// Fields skipped while decoding the raw payload. They can be megabytes on
/// large plates and nothing downstream reads them.
pub const OVERSIZED_STATUS_FIELDS: &[&str] = &["FillAreas", "fill_areas", "LayerAreas"];

const PRINTING_KEYS: &[&str] = &["Printing", "printing", "IsPrinting"];
const PAUSED_KEYS: &[&str] = &["Paused", "paused", "IsPaused"];
const STATE_KEYS: &[&str] = &["State", "state"];
const LAYER_KEYS: &[&str] = &["LayerID", "layer_id", "layerId", "Layer"];
const LAYERS_COUNT_KEYS: &[&str] = &["LayersCount", "layers_count", "layersCount", "LayerCount"];
const HEIGHT_MICRONS_KEYS: &[&str] = &["CurrentHeight", "current_height", "currentHeight"];
const Z_MM_KEYS: &[&str] = &["z", "Z", "z_mm"];
const STATUS_MESSAGE_KEYS: &[&str] = &["Status", "status", "Message"];
const CURING_KEYS: &[&str] = &["Cure", "cure", "Curing", "curing"];
const FILE_KEYS: &[&str] = &["file", "File", "file_data", "Plate", "plate"];
const TEMPERATURE_KEYS: &[(&str, &[&str])] = &[
    ("resin", &["resin", "ResinTemp", "resin_temp"]),
    ("chamber", &["chamber", "ChamberTemp", "chamber_temp"]),
    ("cpu", &["temp", "Temp", "cpu_temp", "CPUTemp"]),
    ("mcu", &["mcu", "MCUTemp", "mcu_temp"]),
];

/// Result of one status poll. Built fresh per poll and never cached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub printing: bool,
    pub paused: bool,
    /// Raw numeric device state code.
    pub state: Option<i64>,
    pub layer_id: Option<i64>,
    pub layers_count: Option<i64>,
    /// Current Z position in millimetres.
    pub z_mm: Option<f64>,
    pub plate_id: Option<i64>,
    /// File metadata, when the device embeds it or it was resolved.
    pub file: Option<PlateRecord>,
    /// Temperatures by sensor name, in °C.
    pub temperatures: BTreeMap<String, f64>,
    /// Raw device status message.
    pub device_status: Option<String>,
    pub curing: bool,
}

impl StatusSnapshot {
    /// Parse a decoded status payload.
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let z_mm = json::f64_field(map, HEIGHT_MICRONS_KEYS)
            .map(|microns| microns / 1000.0)
            .or_else(|| json::f64_field(map, Z_MM_KEYS));

        let temperatures = TEMPERATURE_KEYS
            .iter()
            .filter_map(|(sensor, keys)| {
                json::f64_field(map, keys).map(|t| (sensor.to_string(), t))
            })
            .collect();

        let file = json::first(map, FILE_KEYS).and_then(PlateRecord::from_json);

        Self {
            printing: json::bool_field(map, PRINTING_KEYS).unwrap_or(false),
            paused: json::bool_field(map, PAUSED_KEYS).unwrap_or(false),
            state: json::i64_field(map, STATE_KEYS),
            layer_id: json::i64_field(map, LAYER_KEYS),
            layers_count: json::i64_field(map, LAYERS_COUNT_KEYS),
            z_mm,
            plate_id: json::i64_field(map, PLATE_ID_KEYS),
            file,
            temperatures,
            device_status: json::string_field(map, STATUS_MESSAGE_KEYS),
            curing: json::bool_field(map, CURING_KEYS).unwrap_or(false),
        }
    }

    /// Layer progress in `0.0..=1.0`, when both counters are known.
    pub fn progress(&self) -> Option<f64> {
        match (self.layer_id, self.layers_count) {
            (Some(layer), Some(total)) if total > 0 => {
                Some((layer as f64 / total as f64).clamp(0.0, 1.0))
            }
            _ => None,
        }
    }

    /// Whether the payload carried file metadata.
    pub fn has_file_metadata(&self) -> bool {
        self.file.is_some()
    }
}

/// Raw status payload with [`OVERSIZED_STATUS_FIELDS`] skipped.
///
/// Skipped fields are consumed as [`IgnoredAny`], so they are never
/// materialized as JSON values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusPayload(pub Map<String, Value>);

impl StatusPayload {
    /// Decode a status response body.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::from_json(&self.0)
    }
}

impl<'de> Deserialize<'de> for StatusPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PayloadVisitor;

        impl<'de> Visitor<'de> for PayloadVisitor {
            type Value = StatusPayload;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a status object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<StatusPayload, A::Error> {
                let mut map = Map::new();
                while let Some(key) = access.next_key::<String>()? {
                    if OVERSIZED_STATUS_FIELDS.contains(&key.as_str()) {
                        access.next_value::<IgnoredAny>()?;
                    } else {
                        map.insert(key, access.next_value::<Value>()?);
                    }
                }
                Ok(StatusPayload(map))
            }
        }

        deserializer.deserialize_map(PayloadVisitor)
    }
}
