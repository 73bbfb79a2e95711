//! Lenient accessors for vendor JSON.
//!
//! The device is inconsistent about key casing and about how it encodes
//! scalars (`true`, `1`, `"1"` and `"true"` all occur). Each field is read
//! through an ordered list of candidate keys; the first key holding a
//! non-null value wins.

use serde_json::{Map, Value};

/// First non-null value found under any of `keys`, in order.
pub fn first<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| map.get(*k).filter(|v| !v.is_null()))
}

pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn bool_field(map: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    first(map, keys).and_then(as_bool)
}

pub fn i64_field(map: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    first(map, keys).and_then(as_i64)
}

pub fn f64_field(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    first(map, keys).and_then(as_f64)
}

pub fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first(map, keys)
        .and_then(as_string)
        .filter(|s| !s.is_empty())
}
