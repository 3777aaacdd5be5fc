//! Helpers for shaping unstructured cluster objects into tool output

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Serialize an object to YAML without managed-field bookkeeping.
pub fn object_to_yaml(obj: &Value) -> Result<String> {
    let mut obj = obj.clone();
    strip_managed_fields(&mut obj);
    serde_yaml::to_string(&obj).context("failed to marshal YAML")
}

pub fn strip_managed_fields(obj: &mut Value) {
    if let Some(metadata) = obj.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.remove("managedFields");
    }
}

/// String at a JSON pointer, `""` when absent
pub fn str_at<'a>(obj: &'a Value, pointer: &str) -> &'a str {
    obj.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

pub fn i64_at(obj: &Value, pointer: &str) -> i64 {
    obj.pointer(pointer).and_then(Value::as_i64).unwrap_or(0)
}

pub fn array_at<'a>(obj: &'a Value, pointer: &str) -> &'a [Value] {
    obj.pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Compact age like `kubectl get` prints (`40s`, `12m`, `3h`, `5d`).
pub fn to_age(timestamp: &str, now: DateTime<Utc>) -> Option<String> {
    let created = parse_timestamp(timestamp)?;
    let secs = (now - created).num_seconds().max(0);
    let age = match secs {
        s if s < 120 => format!("{}s", s),
        s if s < 2 * 3600 => format!("{}m", s / 60),
        s if s < 2 * 86_400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    };
    Some(age)
}

/// Age of an object from its `metadata.creationTimestamp`
pub fn object_age(obj: &Value, now: DateTime<Utc>) -> Option<String> {
    to_age(str_at(obj, "/metadata/creationTimestamp"), now)
}
