//! Lifecycle manager for embedded staging databases (spec §4.5), grounded
//! on `original_source/.../duckdb_manager.py` for the operation shapes.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;

use graphnode_basic_types::{Error, GraphId, TableName};
use tokio::sync::RwLock;
use vlog::info;

use crate::dedup::{build_create_table_sql, classify, StagingSource, TableKind};
use crate::engine::{ScalarValue, StreamChunk};
use crate::pool::StagingConnectionPool;

#[derive(Debug)]
pub enum TableSource {
    Glob(String),
    Files(Vec<String>),
}

#[derive(Debug)]
pub struct CreateTableRequest {
    pub graph_id: GraphId,
    pub table_name: TableName,
    pub source: TableSource,
}

#[derive(Debug, Clone)]
pub struct CreateTableResponse {
    pub table_name: TableName,
    pub row_count: u64,
    pub kind: &'static str,
}

#[derive(Debug, Clone)]
pub struct QueryTableResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ScalarValue>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

pub struct StagingDatabaseManager {
    base_path: PathBuf,
    pool: StagingConnectionPool,
    tables: RwLock<HashMap<GraphId, HashSet<TableName>>>,
}

impl StagingDatabaseManager {
    pub fn new(base_path: PathBuf, pool: StagingConnectionPool) -> Self {
        Self {
            base_path,
            pool,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// spec §4.5 `create_table`.
    pub async fn create_table(&self, req: CreateTableRequest) -> Result<CreateTableResponse, Error> {
        let conn = self.pool.get_connection(&req.graph_id).await?;

        let sample = match &req.source {
            TableSource::Glob(pattern) => StagingSource::Glob(pattern.as_str()),
            TableSource::Files(paths) => StagingSource::Files(paths.as_slice()),
        };

        let probe_sql = match &sample {
            StagingSource::Glob(_) => {
                "SELECT * FROM read_parquet(?, hive_partitioning=false) LIMIT 0".to_string()
            }
            StagingSource::Files(paths) => {
                let quoted = paths
                    .iter()
                    .map(|p| format!("'{}'", p.replace('\'', "''")))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("SELECT * FROM read_parquet([{quoted}], hive_partitioning=false) LIMIT 0")
            }
        };
        let probe_params = match &sample {
            StagingSource::Glob(pattern) => vec![ScalarValue::Text((*pattern).to_string())],
            StagingSource::Files(_) => vec![],
        };

        let probe = conn
            .query_all(&probe_sql, &probe_params)
            .map_err(|e| Error::QueryFailure(e.to_string()))?;

        let kind = classify(&probe.columns);
        let (create_sql, create_params) =
            build_create_table_sql(&req.table_name, kind, &sample, &probe.columns);
        let bound: Vec<ScalarValue> = create_params.into_iter().map(ScalarValue::Text).collect();

        conn.query_all(&create_sql, &bound)
            .map_err(|e| Error::QueryFailure(e.to_string()))?;

        let count_sql = format!("SELECT count(*) FROM {}", req.table_name.quoted());
        let count_result = conn
            .query_all(&count_sql, &[])
            .map_err(|e| Error::QueryFailure(e.to_string()))?;
        let row_count = count_result
            .rows
            .first()
            .and_then(|r| r.0.first())
            .and_then(ScalarValue::as_i64)
            .unwrap_or(0) as u64;

        self.tables
            .write()
            .await
            .entry(req.graph_id.clone())
            .or_default()
            .insert(req.table_name.clone());

        info!(graph_id = %req.graph_id, table = %req.table_name, row_count, "staging table materialized");

        Ok(CreateTableResponse {
            table_name: req.table_name,
            row_count,
            kind: match kind {
                TableKind::Node => "node",
                TableKind::Edge => "edge",
                TableKind::Passthrough => "passthrough",
            },
        })
    }

    /// spec §4.5 `query_table`.
    pub async fn query_table(
        &self,
        graph_id: &GraphId,
        sql: &str,
        parameters: &[ScalarValue],
    ) -> Result<QueryTableResponse, Error> {
        let started = Instant::now();
        let conn = self.pool.get_connection(graph_id).await?;
        let outcome = conn
            .query_all(sql, parameters)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;

        Ok(QueryTableResponse {
            columns: outcome.columns,
            row_count: outcome.rows.len(),
            rows: outcome.rows.into_iter().map(|r| r.0).collect(),
            execution_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// spec §4.5 `query_table_streaming`. Pulls `chunk_size` rows at a time
    /// from the engine's native cursor rather than materializing the whole
    /// result first; on error the sink receives no further chunks and the
    /// caller is expected to surface the returned `Err` as a terminal chunk
    /// (spec: "yield a single terminal chunk {error, ...} and stop").
    pub async fn query_table_streaming(
        &self,
        graph_id: &GraphId,
        sql: String,
        parameters: Vec<ScalarValue>,
        chunk_size: usize,
        mut on_chunk: impl FnMut(StreamChunk) + Send + 'static,
    ) -> Result<(), Error> {
        let conn = self.pool.get_connection(graph_id).await?;

        tokio::task::spawn_blocking(move || {
            conn.stream_query(&sql, &parameters, chunk_size, &mut |chunk| on_chunk(chunk))
        })
        .await
        .map_err(|e| Error::ConnectionFailure(format!("streaming task panicked: {e}")))?
        .map_err(|e| Error::QueryFailure(e.to_string()))
    }

    /// spec §4.5 `list_tables`.
    pub async fn list_tables(&self, graph_id: &GraphId) -> Vec<TableName> {
        self.tables
            .read()
            .await
            .get(graph_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// spec §4.5 `delete_table`.
    pub async fn delete_table(&self, graph_id: &GraphId, table_name: &TableName) -> Result<(), Error> {
        let conn = self.pool.get_connection(graph_id).await?;
        let sql = format!("DROP TABLE IF EXISTS {}", table_name.quoted());
        conn.execute_batch(&sql)
            .map_err(|e| Error::QueryFailure(e.to_string()))?;

        if let Some(set) = self.tables.write().await.get_mut(graph_id) {
            set.remove(table_name);
        }
        Ok(())
    }

    /// spec §4.5 `refresh_table`: drop the existing table/view and recreate
    /// it as a view over the current file registry (spec §9 Open Question,
    /// resolved in favor of view-on-refresh — see `DESIGN.md`). `files` is
    /// the caller's current list of completed object-storage file paths for
    /// this table; the file registry itself is an external collaborator.
    pub async fn refresh_table(
        &self,
        graph_id: &GraphId,
        table_name: &TableName,
        files: &[String],
    ) -> Result<(), Error> {
        let conn = self.pool.get_connection(graph_id).await?;
        let quoted = table_name.quoted();

        conn.execute_batch(&format!("DROP VIEW IF EXISTS {quoted}; DROP TABLE IF EXISTS {quoted};"))
            .map_err(|e| Error::QueryFailure(e.to_string()))?;

        if files.is_empty() {
            self.tables
                .write()
                .await
                .entry(graph_id.clone())
                .or_default()
                .remove(table_name);
            return Ok(());
        }

        let list = files
            .iter()
            .map(|p| format!("'{}'", p.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "CREATE VIEW {quoted} AS SELECT * FROM read_parquet([{list}], hive_partitioning=false)"
        );
        conn.execute_batch(&sql)
            .map_err(|e| Error::QueryFailure(e.to_string()))?;

        self.tables
            .write()
            .await
            .entry(graph_id.clone())
            .or_default()
            .insert(table_name.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_source_glob_round_trips() {
        let source = TableSource::Glob("s3://bucket/*.parquet".into());
        match source {
            TableSource::Glob(g) => assert_eq!(g, "s3://bucket/*.parquet"),
            TableSource::Files(_) => panic!("expected glob"),
        }
    }
}
