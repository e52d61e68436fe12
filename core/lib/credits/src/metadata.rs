//! JSON metadata helpers for credit transactions (spec §3.6, §9: bounded
//! recursion), grounded on `graphnode_utils::json_depth`'s iterative walk —
//! transaction metadata is the one place in this crate that stores
//! caller-shaped JSON rather than a fixed column set.

use graphnode_basic_types::Error;
use graphnode_utils::json_depth::validate_bounded;
use serde_json::Value;

/// Validates `metadata` against the same depth/array/key bounds applied to
/// any other caller-supplied nested JSON (spec §9: depth ≤ 3, array ≤
/// 1000, keys ≤ 100), converting a limit violation into the crate's public
/// error type.
pub fn validate_metadata(metadata: &Value) -> Result<(), Error> {
    validate_bounded(metadata)
        .map_err(|e| Error::InvalidArgument(format!("transaction metadata: {e}")))
}

pub fn status_of(metadata: &Value) -> Option<&str> {
    metadata.get("status").and_then(Value::as_str)
}

pub fn reservation_id_of(metadata: &Value) -> Option<&str> {
    metadata.get("reservation_id").and_then(Value::as_str)
}

pub fn expires_at_of(metadata: &Value) -> Option<chrono::DateTime<chrono::Utc>> {
    metadata
        .get("expires_at")
        .and_then(Value::as_str)
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}
