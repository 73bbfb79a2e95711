//! Plate records: the device's view of one file/job.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::json;

/// Candidate keys for the numeric plate identifier, in lookup order.
///
/// The device API spells this field several ways across endpoints and
/// firmware versions; every reader goes through this list.
pub const PLATE_ID_KEYS: &[&str] = &["PlateID", "plate_id", "Plateid", "plateId"];

const PATH_KEYS: &[&str] = &["Path", "path", "resolved_path", "resolvedPath", "File", "file"];
const NAME_KEYS: &[&str] = &["Name", "name", "FileName", "file_name"];
const LAST_MODIFIED_KEYS: &[&str] = &[
    "LastModified",
    "last_modified",
    "lastModified",
    "Updated",
    "updated",
    "mtime",
];
const LAYER_COUNT_KEYS: &[&str] = &[
    "LayersCount",
    "layers_count",
    "LayerCount",
    "layer_count",
    "layerCount",
];
const USED_MATERIAL_KEYS: &[&str] = &["UsedMaterial", "used_material", "usedMaterial"];
const PRINT_TIME_KEYS: &[&str] = &["PrintTime", "print_time", "printTime", "TotalTime"];
const PREVIEW_KEYS: &[&str] = &[
    "Preview",
    "preview",
    "HasPreview",
    "has_preview",
    "Processed",
];

/// Normalized view of one device-known plate.
///
/// Built from one plates-list entry and replaced wholesale on every list
/// refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateRecord {
    /// Numeric plate ID. May be absent, and may be reassigned when a file
    /// is replaced on the device.
    pub plate_id: Option<i64>,
    /// Path as the device resolves it (relative, e.g. `jobs/cube.sl1`).
    pub path: String,
    /// Display name.
    pub name: String,
    /// Last-modified timestamp as reported by the device.
    pub last_modified: Option<i64>,
    pub layer_count: Option<i64>,
    pub used_material: Option<f64>,
    /// Estimated print time in seconds.
    pub print_time: Option<f64>,
    /// Whether the device reports a 3D preview image for this plate.
    pub preview: bool,
}

impl PlateRecord {
    /// Parse one plate entry. Returns `None` for non-objects and for
    /// entries with neither a path nor a name.
    pub fn from_json(value: &Value) -> Option<Self> {
        let map = value.as_object()?;

        let path = json::string_field(map, PATH_KEYS);
        let name = json::string_field(map, NAME_KEYS);
        let (path, name) = match (path, name) {
            (Some(path), Some(name)) => (path, name),
            (Some(path), None) => {
                let name = file_name(&path).to_string();
                (path, name)
            }
            (None, Some(name)) => (name.clone(), name),
            (None, None) => return None,
        };

        Some(Self {
            plate_id: json::i64_field(map, PLATE_ID_KEYS),
            path,
            name,
            last_modified: json::i64_field(map, LAST_MODIFIED_KEYS),
            layer_count: json::i64_field(map, LAYER_COUNT_KEYS),
            used_material: json::f64_field(map, USED_MATERIAL_KEYS),
            print_time: json::f64_field(map, PRINT_TIME_KEYS),
            preview: json::bool_field(map, PREVIEW_KEYS).unwrap_or(true),
        })
    }

    /// Whether `path` refers to this plate.
    ///
    /// Compares case-insensitively against both the resolved path and the
    /// display name, ignoring leading slashes on either side.
    pub fn matches_path(&self, path: &str) -> bool {
        let wanted = normalize_path(path);
        if wanted.is_empty() {
            return false;
        }
        normalize_path(&self.path) == wanted || normalize_path(&self.name) == wanted
    }

    /// Identifier that survives plate-ID churn: resolved path plus
    /// last-modified time. Falls back to the plate ID when the device
    /// reports no path.
    pub fn stable_id(&self) -> String {
        if self.path.is_empty() {
            format!("id:{}", self.plate_id.unwrap_or_default())
        } else {
            format!(
                "path:{}|lm:{}",
                self.path,
                self.last_modified.unwrap_or_default()
            )
        }
    }
}

/// Lowercase `path` and strip surrounding whitespace and leading slashes.
pub fn normalize_path(path: &str) -> String {
    path.trim().trim_start_matches('/').to_lowercase()
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_nanodlp_entry() {
        let plate = PlateRecord::from_json(&json!({
            "PlateID": 7,
            "Path": "jobs/cube.sl1",
            "LayersCount": 120,
            "Updated": 1_700_000_000,
            "UsedMaterial": "12.5",
            "PrintTime": 3600,
        }))
        .unwrap();

        assert_eq!(plate.plate_id, Some(7));
        assert_eq!(plate.path, "jobs/cube.sl1");
        assert_eq!(plate.name, "cube.sl1");
        assert_eq!(plate.layer_count, Some(120));
        assert_eq!(plate.last_modified, Some(1_700_000_000));
        assert_eq!(plate.used_material, Some(12.5));
        assert!(plate.preview);
    }

    #[test]
    fn name_only_entry_uses_name_as_path() {
        let plate = PlateRecord::from_json(&json!({"plate_id": "3", "name": "ring.zip"})).unwrap();
        assert_eq!(plate.plate_id, Some(3));
        assert_eq!(plate.path, "ring.zip");
    }

    #[test]
    fn entry_without_path_or_name_is_skipped() {
        assert!(PlateRecord::from_json(&json!({"PlateID": 1})).is_none());
        assert!(PlateRecord::from_json(&json!("cube.sl1")).is_none());
    }

    #[test]
    fn preview_flag_is_read() {
        let plate = PlateRecord::from_json(&json!({"Path": "a.sl1", "Preview": false})).unwrap();
        assert!(!plate.preview);
    }

    #[test]
    fn path_matching_ignores_case_and_leading_slash() {
        let plate = PlateRecord::from_json(&json!({"Path": "/Jobs/Cube.SL1", "Name": "Cube"})).unwrap();
        assert!(plate.matches_path("jobs/cube.sl1"));
        assert!(plate.matches_path("//jobs/cube.sl1"));
        assert!(plate.matches_path("/cube"));
        assert!(!plate.matches_path("cube.sl1"));
        assert!(!plate.matches_path(""));
    }

    #[test]
    fn stable_id_ignores_plate_id() {
        let a = PlateRecord::from_json(&json!({"PlateID": 1, "Path": "a.sl1", "Updated": 5})).unwrap();
        let b = PlateRecord::from_json(&json!({"PlateID": 2, "Path": "a.sl1", "Updated": 5})).unwrap();
        let c = PlateRecord::from_json(&json!({"PlateID": 1, "Path": "a.sl1", "Updated": 6})).unwrap();
        assert_eq!(a.stable_id(), b.stable_id());
        assert_ne!(a.stable_id(), c.stable_id());
        assert_eq!(a.stable_id(), "path:a.sl1|lm:5");
    }
}
