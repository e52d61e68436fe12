//! The narrow seam between this crate's pool/manager logic and the
//! embedded Cypher engine itself (`kuzu`). Kept as a trait, per the
//! teacher's habit of wrapping the raw driver type (`PgConnection`) behind
//! crate-local types (`ConnectionHolder`, `StorageProcessor`) rather than
//! threading it through every call site, and so unit tests can substitute a
//! fake engine instead of touching the filesystem.

use std::path::Path;

use anyhow::Result;

/// One row of a query result, as loosely-typed values. The engine adapter
/// owns converting `kuzu::Value` into this shape; callers that need more
/// precision (e.g. the ingestion pipeline's row-count parsing) work off
/// `QueryRow::as_count()` or the raw string rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(v) => Some(*v),
            ScalarValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryRow(pub Vec<ScalarValue>);

#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub columns: Vec<String>,
    pub rows: Vec<QueryRow>,
    /// Engine-reported summary line (e.g. `"2 tuples"`), used by the
    /// ingestion pipeline to parse the `COPY` row count (spec §4.6 step 6).
    pub summary: Option<String>,
}

/// Tuning knobs applied once, at connection-creation time (spec §4.2).
#[derive(Debug, Clone, Copy)]
pub struct EngineTuning {
    pub buffer_pool_bytes: u64,
    pub checkpoint_threshold_bytes: u64,
    pub read_only: bool,
}

/// Abstracts over a single embedded-engine connection handle. Implemented
/// for the real `kuzu` driver in [`KuzuConnection`] and for an in-memory
/// fake in unit tests.
pub trait GraphEngine: Send {
    fn open(path: &Path, tuning: EngineTuning) -> Result<Self>
    where
        Self: Sized;

    fn execute(&mut self, cypher: &str) -> Result<QueryOutcome>;

    /// `RETURN 1` probe; implementations must fully drain the result set
    /// before returning so no cursor is left open against the connection
    /// (spec §4.4: "results must be drained before returning to prevent
    /// leaks").
    fn health_check(&mut self) -> Result<bool> {
        match self.execute("RETURN 1") {
            Ok(outcome) => Ok(!outcome.rows.is_empty()),
            Err(_) => Ok(false),
        }
    }
}

/// Real adapter over the `kuzu` embedded database driver.
pub struct KuzuConnection {
    // `kuzu::Database` must outlive `kuzu::Connection`; both are kept here
    // so the pair closes together when the `Conn` is dropped.
    database: kuzu::Database,
    connection: kuzu::Connection<'static>,
}

impl GraphEngine for KuzuConnection {
    fn open(path: &Path, tuning: EngineTuning) -> Result<Self> {
        let system_config = kuzu::SystemConfig::default()
            .buffer_pool_size(tuning.buffer_pool_bytes)
            .checkpoint_threshold(tuning.checkpoint_threshold_bytes)
            .read_only(tuning.read_only);

        let database = kuzu::Database::new(path, system_config)?;
        // SAFETY: `connection` borrows `database`, which we keep alive in
        // the same struct for the lifetime of `KuzuConnection`; the
        // `'static` annotation is erased only for storage purposes and
        // never escapes this module.
        let connection: kuzu::Connection<'static> =
            unsafe { std::mem::transmute(kuzu::Connection::new(&database)?) };

        Ok(Self {
            database,
            connection,
        })
    }

    fn execute(&mut self, cypher: &str) -> Result<QueryOutcome> {
        let mut result = self.connection.query(cypher)?;
        let columns = result.get_column_names().to_vec();
        let mut rows = Vec::new();
        while result.has_next() {
            let row = result.get_next()?;
            rows.push(QueryRow(
                row.into_iter().map(kuzu_value_to_scalar).collect(),
            ));
        }
        Ok(QueryOutcome {
            columns,
            rows,
            summary: None,
        })
    }
}

fn kuzu_value_to_scalar(value: kuzu::Value) -> ScalarValue {
    match value {
        kuzu::Value::Null(_) => ScalarValue::Null,
        kuzu::Value::Bool(b) => ScalarValue::Bool(b),
        kuzu::Value::Int64(i) => ScalarValue::Int(i),
        kuzu::Value::Double(f) => ScalarValue::Float(f),
        other => ScalarValue::Text(other.to_string()),
    }
}
