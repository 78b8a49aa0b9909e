//! JSON paths inside JSON-typed fields.

use std::collections::BTreeMap;

use crate::value::Value;

/// `$.a.b`, `$a.b`, `.a.b` and `a.b` all name the segments `[a, b]`.
pub fn json_path_segments(path: &str) -> Vec<&str> {
    let mut p = path.trim();
    p = p.strip_prefix("$.").unwrap_or(p);
    p = p.strip_prefix('$').unwrap_or(p);
    p = p.strip_prefix('.').unwrap_or(p);
    if p.trim().is_empty() {
        return Vec::new();
    }
    p.split('.').collect()
}

/// `{a: {b: value}}` for segments `[a, b]`. Without segments, objects and
/// arrays are used as is and anything else becomes `{value: v}`.
pub fn json_fragment(segments: &[&str], value: Value) -> Value {
    if segments.is_empty() {
        return match value {
            Value::Map(_) | Value::List(_) => value,
            other => Value::Map(BTreeMap::from([("value".to_string(), other)])),
        };
    }
    segments.iter().rev().fold(value, |acc, seg| {
        Value::Map(BTreeMap::from([(seg.to_string(), acc)]))
    })
}
