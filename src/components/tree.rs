//! Access helpers for the badgerfish-convention document tree.
//!
//! The external dialect maps onto JSON as: attributes become `"@name"` keys,
//! element text becomes a `"$"` leaf, repeated sibling elements become
//! arrays. Keys are case-sensitive and sibling order is meaningful, so the
//! backing store is `serde_json::Value` with ordered maps. These helpers
//! give typed, checked access; unknown fields simply ride along untouched.

use serde_json::Value;

use crate::errors::{Result, VrtError};

pub(crate) fn child<'a>(node: &'a Value, key: &str) -> Result<&'a Value> {
    node.get(key)
        .ok_or_else(|| VrtError::MissingField(key.to_string()))
}

pub(crate) fn child_mut<'a>(node: &'a mut Value, key: &str) -> Result<&'a mut Value> {
    node.get_mut(key)
        .ok_or_else(|| VrtError::MissingField(key.to_string()))
}

pub(crate) fn descend<'a>(node: &'a Value, path: &[&str]) -> Result<&'a Value> {
    path.iter().try_fold(node, |node, &key| child(node, key))
}

pub(crate) fn descend_mut<'a>(node: &'a mut Value, path: &[&str]) -> Result<&'a mut Value> {
    path.iter()
        .try_fold(node, |node, &key| child_mut(node, key))
}

/// The `"$"` text leaf of an element node.
pub(crate) fn text<'a>(node: &'a Value) -> Result<&'a Value> {
    child(node, "$")
}

/// Write `node[key] = {"$": value}`, creating or replacing the element.
pub(crate) fn set_text(node: &mut Value, key: &str, value: Value) {
    node[key] = serde_json::json!({ "$": value });
}

/// Numeric coercion; documents loaded from the XML side may carry numbers
/// as strings.
pub(crate) fn as_f64(value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| VrtError::Malformed(format!("non-finite number {n}"))),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| VrtError::Malformed(format!("expected number, got {s:?}"))),
        other => Err(VrtError::Malformed(format!(
            "expected number, got {other}"
        ))),
    }
}

pub(crate) fn as_i64(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| VrtError::Malformed(format!("non-integral number {n}"))),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| VrtError::Malformed(format!("expected integer, got {s:?}"))),
        other => Err(VrtError::Malformed(format!(
            "expected integer, got {other}"
        ))),
    }
}

pub(crate) fn as_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| VrtError::Malformed(format!("expected string, got {value}")))
}

/// Coerce `node[key]` into a one-element array if the loader produced a
/// single object (single-child elements are not arrays in the dialect).
pub(crate) fn ensure_array(node: &mut Value, key: &str) {
    if let Some(entry) = node.get_mut(key) {
        if !entry.is_array() {
            let single = entry.take();
            *entry = Value::Array(vec![single]);
        }
    }
}

pub(crate) fn array<'a>(node: &'a Value, key: &str) -> Result<&'a Vec<Value>> {
    child(node, key)?
        .as_array()
        .ok_or_else(|| VrtError::Malformed(format!("{key} is not an array")))
}

pub(crate) fn array_mut<'a>(node: &'a mut Value, key: &str) -> Result<&'a mut Vec<Value>> {
    child_mut(node, key)?
        .as_array_mut()
        .ok_or_else(|| VrtError::Malformed(format!("{key} is not an array")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descend_reports_missing_key() {
        let node = json!({"a": {"b": {"$": 1}}});
        assert_eq!(as_i64(text(descend(&node, &["a", "b"]).unwrap()).unwrap()).unwrap(), 1);
        let err = descend(&node, &["a", "c"]).unwrap_err();
        assert!(matches!(err, VrtError::MissingField(key) if key == "c"));
    }

    #[test]
    fn numeric_coercion_accepts_strings() {
        assert_eq!(as_f64(&json!("2.5")).unwrap(), 2.5);
        assert_eq!(as_i64(&json!("42")).unwrap(), 42);
        assert_eq!(as_i64(&json!(42.0)).unwrap(), 42);
        assert!(as_f64(&json!({"x": 1})).is_err());
    }

    #[test]
    fn ensure_array_wraps_single_nodes() {
        let mut node = json!({"Band": {"@band": 1}});
        ensure_array(&mut node, "Band");
        assert_eq!(node["Band"], json!([{"@band": 1}]));
        // Already an array: untouched.
        ensure_array(&mut node, "Band");
        assert_eq!(node["Band"].as_array().unwrap().len(), 1);
    }
}
