//! The narrow seam between this crate's pool/manager logic and the
//! embedded analytical engine (`duckdb`). Mirrors the split in
//! `graphnode_graph_store::engine`: a small trait real code and fakes both
//! implement, so schema probing and dedup DDL generation can be unit
//! tested without touching the filesystem.

use std::path::Path;

use anyhow::{Context, Result};

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
    /// Engine-reported row count when distinct from `rows.len()` (DDL
    /// statements report affected-row counts with no result rows).
    pub rows_affected: Option<u64>,
}

/// One chunk of a streamed query result (spec §4.5 `query_table_streaming`).
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub columns: Option<Vec<String>>,
    pub rows: Vec<QueryRow>,
    pub chunk_index: u64,
    pub is_last_chunk: bool,
    pub row_count: usize,
    pub total_rows_sent: u64,
}

/// Object-storage credentials and addressing mode installed on every new
/// connection (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct ObjectStoreCredentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StagingTuning {
    pub thread_count: u32,
    pub memory_limit_mb: u64,
    pub credentials: ObjectStoreCredentials,
}

/// Abstracts over a single embedded analytical-engine connection. The real
/// adapter wraps `duckdb::Connection`; unit tests use an in-memory fake.
pub trait StagingEngine: Send {
    fn open(path: &Path, tuning: &StagingTuning) -> Result<Self>
    where
        Self: Sized;

    /// Runs DDL/DML with no result set expected.
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Runs a query and fetches every row (spec §4.5 `query_table`).
    fn query_all(&self, sql: &str, params: &[ScalarValue]) -> Result<QueryOutcome>;

    /// Runs a query, invoking `sink` once per `chunk_size` rows without
    /// materializing the whole result set first (spec §4.5
    /// `query_table_streaming`: "execute, do not fetch all").
    fn stream_query(
        &self,
        sql: &str,
        params: &[ScalarValue],
        chunk_size: usize,
        sink: &mut dyn FnMut(StreamChunk),
    ) -> Result<()>;

    fn health_check(&self) -> Result<bool> {
        match self.query_all("SELECT 1", &[]) {
            Ok(outcome) => Ok(!outcome.rows.is_empty()),
            Err(_) => Ok(false),
        }
    }
}

/// Real adapter over the `duckdb` embedded analytical engine.
pub struct DuckDbConnection {
    connection: duckdb::Connection,
}

impl StagingEngine for DuckDbConnection {
    fn open(path: &Path, tuning: &StagingTuning) -> Result<Self> {
        let connection =
            duckdb::Connection::open(path).context("opening staging database file")?;

        // spec §4.3 steps 1-4: object-storage + parquet extensions, then
        // per-connection credential/endpoint/thread/memory setup.
        connection
            .execute_batch("INSTALL httpfs; LOAD httpfs; INSTALL parquet; LOAD parquet;")
            .context("loading object-storage and parquet extensions")?;

        if let (Some(key), Some(secret)) = (
            &tuning.credentials.access_key_id,
            &tuning.credentials.secret_access_key,
        ) {
            connection
                .execute(
                    "SET s3_access_key_id = ?; SET s3_secret_access_key = ?;",
                    duckdb::params![key, secret],
                )
                .context("setting object-storage credentials")?;
        }
        if let Some(region) = &tuning.credentials.region {
            connection
                .execute("SET s3_region = ?;", duckdb::params![region])
                .context("setting object-storage region")?;
        }
        if let Some(endpoint) = &tuning.credentials.endpoint {
            connection
                .execute("SET s3_endpoint = ?;", duckdb::params![endpoint])
                .context("setting object-storage endpoint")?;
            connection
                .execute_batch("SET s3_url_style = 'path';")
                .context("switching to path-style addressing")?;
        }

        connection
            .execute_batch(&format!(
                "SET threads TO {}; SET memory_limit = '{}MB';",
                tuning.thread_count.max(1),
                tuning.memory_limit_mb.max(64)
            ))
            .context("applying thread/memory limits")?;

        Ok(Self { connection })
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        self.connection.execute_batch(sql)?;
        Ok(())
    }

    fn query_all(&self, sql: &str, params: &[ScalarValue]) -> Result<QueryOutcome> {
        let mut stmt = self.connection.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names();
        let bound = bind_params(params);
        let rows = stmt.query_map(bound.as_slice(), |row| {
            Ok(QueryRow(row_to_scalars(row, columns.len())))
        })?;
        let collected: Result<Vec<_>, duckdb::Error> = rows.collect();
        Ok(QueryOutcome {
            columns,
            rows: collected?,
            rows_affected: None,
        })
    }

    fn stream_query(
        &self,
        sql: &str,
        params: &[ScalarValue],
        chunk_size: usize,
        sink: &mut dyn FnMut(StreamChunk),
    ) -> Result<()> {
        let mut stmt = self.connection.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names();
        let bound = bind_params(params);
        let mut rows_iter = stmt.query(bound.as_slice())?;

        let mut buffer = Vec::with_capacity(chunk_size.max(1));
        let mut chunk_index = 0u64;
        let mut total_sent = 0u64;

        while let Some(row) = rows_iter.next()? {
            buffer.push(QueryRow(row_to_scalars(row, columns.len())));
            if buffer.len() >= chunk_size.max(1) {
                let chunk_row_count = buffer.len();
                total_sent += chunk_row_count as u64;
                sink(StreamChunk {
                    columns: if chunk_index == 0 {
                        Some(columns.clone())
                    } else {
                        None
                    },
                    rows: std::mem::take(&mut buffer),
                    chunk_index,
                    is_last_chunk: false,
                    row_count: chunk_row_count,
                    total_rows_sent: total_sent,
                });
                chunk_index += 1;
            }
        }

        total_sent += buffer.len() as u64;
        let final_row_count = buffer.len();
        sink(StreamChunk {
            columns: if chunk_index == 0 {
                Some(columns.clone())
            } else {
                None
            },
            rows: buffer,
            chunk_index,
            is_last_chunk: true,
            row_count: final_row_count,
            total_rows_sent: total_sent,
        });

        Ok(())
    }
}

fn bind_params(params: &[ScalarValue]) -> Vec<Box<dyn duckdb::ToSql>> {
    params
        .iter()
        .map(|p| -> Box<dyn duckdb::ToSql> {
            match p {
                ScalarValue::Null => Box::new(Option::<String>::None),
                ScalarValue::Bool(b) => Box::new(*b),
                ScalarValue::Int(i) => Box::new(*i),
                ScalarValue::Float(f) => Box::new(*f),
                ScalarValue::Text(s) => Box::new(s.clone()),
            }
        })
        .collect()
}

fn row_to_scalars(row: &duckdb::Row, column_count: usize) -> Vec<ScalarValue> {
    (0..column_count).map(|idx| scalar_from_row(row, idx)).collect()
}

/// Reads one column as the narrowest type it actually holds, the way
/// `graph_store`'s Kuzu adapter matches on `kuzu::Value` variants instead of
/// flattening everything to text. `duckdb::Row::get` errors on a type
/// mismatch rather than coercing, so each attempt below falls through to the
/// next narrower-to-wider type before giving up and rendering as text.
fn scalar_from_row(row: &duckdb::Row, idx: usize) -> ScalarValue {
    match row.get::<_, Option<i64>>(idx) {
        Ok(Some(v)) => return ScalarValue::Int(v),
        Ok(None) => return ScalarValue::Null,
        Err(_) => {}
    }
    match row.get::<_, Option<f64>>(idx) {
        Ok(Some(v)) => return ScalarValue::Float(v),
        Ok(None) => return ScalarValue::Null,
        Err(_) => {}
    }
    match row.get::<_, Option<bool>>(idx) {
        Ok(Some(v)) => return ScalarValue::Bool(v),
        Ok(None) => return ScalarValue::Null,
        Err(_) => {}
    }
    match row.get::<_, Option<String>>(idx) {
        Ok(Some(v)) => ScalarValue::Text(v),
        _ => ScalarValue::Null,
    }
}
