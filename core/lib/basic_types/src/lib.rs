//! Primitive identifiers and the shared error type for the graph-node engine.
//!
//! Mirrors the role `zksync_basic_types` plays for the teacher workspace:
//! every other crate in this workspace depends on this one and nothing else
//! in the reverse direction, so identifier and error shapes only need to be
//! agreed on once.

#[macro_use]
mod macros;

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex is valid"));

const MAX_GRAPH_ID_LEN: usize = 64;

/// Tenant identifier. Validated once at the edge (§3.1 of the spec this
/// engine implements) and passed around as a cheap, already-checked value
/// from then on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(String);

impl GraphId {
    /// Validates `raw` against the identifier charset and length limit.
    /// Rejects empty strings, slashes, backslashes, `..`, NUL, and anything
    /// outside `[A-Za-z0-9_-]`.
    pub fn parse(raw: impl Into<String>) -> Result<Self, Error> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(Error::InvalidArgument("graph_id cannot be empty".into()));
        }
        if raw.len() > MAX_GRAPH_ID_LEN {
            return Err(Error::InvalidArgument(format!(
                "graph_id exceeds {MAX_GRAPH_ID_LEN} characters"
            )));
        }
        if raw.contains("..") || raw.contains('/') || raw.contains('\\') || raw.contains('\0') {
            return Err(Error::InvalidArgument(
                "graph_id contains illegal characters".into(),
            ));
        }
        if !IDENTIFIER_RE.is_match(&raw) {
            return Err(Error::InvalidArgument(
                "graph_id format: only alphanumeric, underscore, and hyphen allowed".into(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GraphId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Staging table name. Shares the identifier charset with `GraphId` but is
/// kept as a distinct type so a table name can never be passed where a
/// graph id is expected, and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    pub fn parse(raw: impl Into<String>) -> Result<Self, Error> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(Error::InvalidArgument("table_name cannot be empty".into()));
        }
        if !IDENTIFIER_RE.is_match(&raw) {
            return Err(Error::InvalidArgument(
                "table_name format: only alphanumeric, underscore, and hyphen allowed".into(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quotes the table name for interpolation into DDL that the target
    /// engine does not let us parameter-bind (identifiers, not values).
    /// Only ever called after `parse` has already rejected quote characters
    /// and path-traversal sequences, but this doubles as a belt for a
    /// direction the charset regex does not otherwise cover: embedded `"`.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', ""))
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier for a credit pool (per-graph or per-user-repository).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolId(pub uuid::Uuid);
impl_deref!(PoolId, uuid::Uuid);
impl_display_via_inner!(PoolId);

/// Identifier for a credit reservation, supplied by the caller so that a
/// retried request is idempotent against the reservation it already made.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub String);
impl_display_via_inner!(ReservationId);

/// Schema a graph database is created with (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    Entity,
    Shared,
    Custom,
}

/// The semantic error categories the engine raises, narrowed from
/// engine-specific failures at each component boundary (spec §7). Internal
/// propagation within a component still uses `anyhow::Error`, matching
/// `QueryResult<T> = Result<T, anyhow::Error>` in the teacher's storage
/// crate; this type is what crosses a public API boundary.
#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("capacity exceeded: {current}/{max} databases on this node")]
    CapacityExceeded { current: u32, max: u32 },

    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    #[error("query failed: {0}")]
    QueryFailure(String),

    #[error("insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: f64, available: f64 },

    #[error("credit pool is inactive")]
    InactivePool,

    #[error("reservation {reservation_id} expired at {expires_at}")]
    ReservationExpired {
        reservation_id: String,
        expires_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("staging checkpoint failed after {attempts} attempts: {source}")]
    CheckpointFailed { attempts: u32, source: String },

    #[error("rebuild failed: {reason} (last backup: {last_backup:?})")]
    RebuildFailed {
        reason: String,
        last_backup: Option<String>,
    },
}

impl Error {
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidArgument(_) => 400,
            Error::NotFound(_) => 404,
            Error::Conflict(_) => 409,
            Error::CapacityExceeded { .. } => 507,
            Error::InsufficientCredits { .. } | Error::InactivePool => 402,
            Error::ReservationExpired { .. } => 410,
            Error::ConnectionFailure(_)
            | Error::QueryFailure(_)
            | Error::CheckpointFailed { .. }
            | Error::RebuildFailed { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_traversal() {
        assert!(GraphId::parse("").is_err());
        assert!(GraphId::parse("../evil").is_err());
        assert!(GraphId::parse("a/b").is_err());
        assert!(GraphId::parse("a\\b").is_err());
        assert!(GraphId::parse("a\0b").is_err());
        assert!(GraphId::parse("a.b").is_err());
        assert!(GraphId::parse(&"a".repeat(65)).is_err());
    }

    #[test]
    fn accepts_valid_ids() {
        assert!(GraphId::parse("kg_demo").is_ok());
        assert!(GraphId::parse("a-B_1").is_ok());
    }

    #[test]
    fn table_name_quoting_strips_embedded_quotes() {
        let name = TableName::parse("Entity").unwrap();
        assert_eq!(name.quoted(), "\"Entity\"");
    }
}
