//! Order-independent hashing for JSON values.
//!
//! Conditions and principals are arbitrary JSON mappings. Two mappings holding the same
//! key/value pairs must group together no matter how their keys were ordered in the
//! source document, so hashing visits object keys in sorted order.

use serde_json::Value;
use std::hash::{Hash, Hasher};

/// Feed a JSON value into `state`, visiting object keys in sorted order.
pub(crate) fn hash_json<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Number(n) => {
            2u8.hash(state);
            n.to_string().hash(state);
        }
        Value::String(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_json(item, state);
            }
        }
        Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, item) in entries {
                key.hash(state);
                hash_json(item, state);
            }
        }
    }
}

/// Hash an optional JSON value
pub(crate) fn hash_optional_json<H: Hasher>(value: Option<&Value>, state: &mut H) {
    match value {
        None => 0u8.hash(state),
        Some(v) => {
            1u8.hash(state);
            hash_json(v, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::hash_map::DefaultHasher;

    fn digest(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        hash_json(value, &mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_key_order_does_not_change_hash() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": [1, 2], "x": null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": null, "y": [1, 2]}, "b": 1}"#).unwrap();

        assert_eq!(a, b);
        assert_eq!(digest(&a), digest(&b));
    }

    #[test]
    fn test_array_order_changes_hash() {
        assert_ne!(digest(&json!([1, 2])), digest(&json!([2, 1])));
    }

    #[test]
    fn test_absent_and_null_differ() {
        let mut absent = DefaultHasher::new();
        hash_optional_json(None, &mut absent);
        let mut null = DefaultHasher::new();
        hash_optional_json(Some(&Value::Null), &mut null);

        assert_ne!(absent.finish(), null.finish());
    }
}
