//! Bounded-depth validation for arbitrary JSON handed to the engine as
//! transaction metadata (spec §9: "Deep recursion in parameter validation").
//! The teacher's `zksync_config` world never needed this (its configs are
//! flat, strongly-typed structs), so this is grounded directly on the
//! redesign note rather than a specific teacher file: an iterative walk
//! with an explicit stack, so a maliciously deep JSON payload cannot blow
//! the Rust call stack the way a naive recursive validator would.

use serde_json::Value;

const MAX_DEPTH: usize = 3;
const MAX_ARRAY_LEN: usize = 1000;
const MAX_OBJECT_KEYS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonLimitError {
    #[error("json nesting exceeds max depth {MAX_DEPTH}")]
    TooDeep,
    #[error("json array exceeds max length {MAX_ARRAY_LEN}")]
    ArrayTooLong,
    #[error("json object exceeds max key count {MAX_OBJECT_KEYS}")]
    TooManyKeys,
}

/// Walks `value` breadth-first with an explicit work stack, bounding stack
/// depth to a constant regardless of input shape. Returns an error on the
/// first violated limit.
pub fn validate_bounded(value: &Value) -> Result<(), JsonLimitError> {
    let mut stack: Vec<(&Value, usize)> = vec![(value, 0)];

    while let Some((node, depth)) = stack.pop() {
        if depth > MAX_DEPTH {
            return Err(JsonLimitError::TooDeep);
        }
        match node {
            Value::Array(items) => {
                if items.len() > MAX_ARRAY_LEN {
                    return Err(JsonLimitError::ArrayTooLong);
                }
                for item in items {
                    stack.push((item, depth + 1));
                }
            }
            Value::Object(map) => {
                if map.len() > MAX_OBJECT_KEYS {
                    return Err(JsonLimitError::TooManyKeys);
                }
                for v in map.values() {
                    stack.push((v, depth + 1));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_shallow_metadata() {
        let value = json!({"reservation_id": "r1", "expires_at": "2026-01-01T00:00:00Z"});
        assert!(validate_bounded(&value).is_ok());
    }

    #[test]
    fn rejects_excess_depth() {
        let value = json!({"a": {"b": {"c": {"d": "too deep"}}}});
        assert_eq!(validate_bounded(&value), Err(JsonLimitError::TooDeep));
    }

    #[test]
    fn rejects_oversized_array() {
        let items: Vec<i32> = (0..1001).collect();
        let value = json!({ "items": items });
        assert_eq!(validate_bounded(&value), Err(JsonLimitError::ArrayTooLong));
    }

    #[test]
    fn rejects_too_many_keys() {
        let mut map = serde_json::Map::new();
        for i in 0..101 {
            map.insert(format!("k{i}"), json!(i));
        }
        let value = Value::Object(map);
        assert_eq!(validate_bounded(&value), Err(JsonLimitError::TooManyKeys));
    }
}
