//! Lifecycle manager for embedded graph databases (spec §4.4), grounded on
//! `original_source/.../database_manager.py` for the operation shapes and
//! on `core/lib/storage/src/chain/account/mod.rs` for the
//! schema-over-pooled-connection pattern: every operation acquires a
//! connection, runs its statements, and lets the pool reclaim it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use graphnode_basic_types::{Error, GraphId, SchemaType};
use tokio::sync::RwLock;
use vlog::{info, warn};

use crate::engine::{EngineTuning, GraphEngine};
use crate::pool::GraphConnectionPool;
use crate::schema::{split_custom_ddl, SchemaCatalog};

/// Transition target reported by [`GraphDatabaseManager`] operations.
/// Persisting these is the external graph registry's job (spec §4.4: "a
/// collaborator"); this type is what the manager hands that collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    Creating,
    Available,
    Rebuilding,
    RebuildFailed,
}

/// The external graph registry the manager reports state transitions to.
/// Modeled as an explicit constructor dependency rather than a module-level
/// singleton (REDESIGN FLAGS: pass collaborators as explicit dependencies).
/// A no-op implementation is provided for callers with no registry wired up
/// yet.
#[async_trait::async_trait]
pub trait GraphMetadataSink: Send + Sync {
    async fn record_state(&self, graph_id: &GraphId, state: DatabaseState);
}

pub struct NullMetadataSink;

#[async_trait::async_trait]
impl GraphMetadataSink for NullMetadataSink {
    async fn record_state(&self, _graph_id: &GraphId, _state: DatabaseState) {}
}

#[derive(Debug, Clone)]
pub struct CreateDatabaseRequest {
    pub graph_id: GraphId,
    pub schema_type: SchemaType,
    pub repository_name: Option<String>,
    pub custom_schema_ddl: Option<String>,
    pub is_subgraph: bool,
    pub read_only: bool,
}

#[derive(Debug, Clone)]
pub struct CreateDatabaseResponse {
    pub graph_id: GraphId,
    pub database_path: PathBuf,
    pub schema_applied: &'static str,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseInfo {
    pub graph_id: GraphId,
    pub file_size_bytes: u64,
    pub is_healthy: bool,
}

#[derive(Debug, Clone)]
pub struct CapacitySnapshot {
    pub max_databases: u32,
    pub current_databases: u32,
    pub capacity_remaining: u32,
    pub utilization_percent: f64,
}

struct CapacityLedger {
    max_databases_per_node: u32,
    counted: HashMap<GraphId, ()>,
}

pub struct GraphDatabaseManager {
    base_path: PathBuf,
    pool: GraphConnectionPool,
    buffer_pool_bytes: u64,
    ledger: RwLock<CapacityLedger>,
    metadata_sink: Arc<dyn GraphMetadataSink>,
}

impl GraphDatabaseManager {
    pub fn new(
        base_path: PathBuf,
        pool: GraphConnectionPool,
        buffer_pool_bytes: u64,
        max_databases_per_node: u32,
        metadata_sink: Arc<dyn GraphMetadataSink>,
    ) -> Self {
        Self {
            base_path,
            pool,
            buffer_pool_bytes,
            ledger: RwLock::new(CapacityLedger {
                max_databases_per_node,
                counted: HashMap::new(),
            }),
            metadata_sink,
        }
    }

    /// spec §4.4 `create_database`.
    pub async fn create_database(
        &self,
        req: CreateDatabaseRequest,
    ) -> Result<CreateDatabaseResponse, Error> {
        let started = std::time::Instant::now();

        if !req.is_subgraph {
            self.check_capacity().await?;
        }

        let path = graphnode_utils::graph_path(&self.base_path, &req.graph_id)?;
        let graph_id = req.graph_id.clone();

        // Held for the existence check through file creation so a racing
        // `create_database`/`delete_database` for the same graph_id can't
        // interleave with this one (spec §3.2).
        let result = self
            .pool
            .with_graph_lock(&graph_id, || self.create_database_locked(&req, &path))
            .await;

        match result {
            Ok(schema_applied) => {
                if !req.is_subgraph {
                    self.ledger
                        .write()
                        .await
                        .counted
                        .insert(req.graph_id.clone(), ());
                }
                self.metadata_sink
                    .record_state(&req.graph_id, DatabaseState::Available)
                    .await;
                Ok(CreateDatabaseResponse {
                    graph_id: req.graph_id,
                    database_path: path,
                    schema_applied,
                    execution_time_ms: started.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                if path.exists() {
                    if let Err(cleanup_err) = std::fs::remove_file(&path) {
                        warn!(
                            graph_id = %req.graph_id,
                            "failed to clean up partially-created database file: {cleanup_err}"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Existence check plus `Creating` state transition, run while holding
    /// the pool's per-graph_id lock (spec §3.2).
    async fn create_database_locked(
        &self,
        req: &CreateDatabaseRequest,
        path: &std::path::Path,
    ) -> Result<&'static str, Error> {
        if path.exists() {
            return Err(Error::Conflict(format!(
                "graph database '{}' already exists",
                req.graph_id
            )));
        }

        self.metadata_sink
            .record_state(&req.graph_id, DatabaseState::Creating)
            .await;

        self.create_database_inner(req, path).await
    }

    async fn create_database_inner(
        &self,
        req: &CreateDatabaseRequest,
        path: &std::path::Path,
    ) -> Result<&'static str, Error> {
        let tuning = EngineTuning {
            buffer_pool_bytes: self.buffer_pool_bytes,
            checkpoint_threshold_bytes: self.pool.checkpoint_threshold_bytes(&req.graph_id),
            read_only: false,
        };
        let path_owned = path.to_path_buf();
        let mut handle = tokio::task::spawn_blocking(move || {
            crate::engine::KuzuConnection::open(&path_owned, tuning)
        })
        .await
        .map_err(|e| Error::ConnectionFailure(format!("bootstrap open task panicked: {e}")))?
        .map_err(|e| Error::ConnectionFailure(e.to_string()))?;

        let (statements, schema_applied) = match req.schema_type {
            SchemaType::Entity => (SchemaCatalog::base().to_ddl(), "entity"),
            SchemaType::Shared => {
                let repo = req.repository_name.as_deref().unwrap_or("");
                (SchemaCatalog::for_repository(repo).to_ddl(), "shared")
            }
            SchemaType::Custom => {
                let ddl = req.custom_schema_ddl.as_deref().ok_or_else(|| {
                    Error::InvalidArgument("custom schema requires custom_schema_ddl".into())
                })?;
                (split_custom_ddl(ddl), "custom")
            }
        };

        let apply_result = apply_statements(&mut handle, &statements, req.schema_type);

        let applied = match apply_result {
            Ok(()) => schema_applied,
            Err(e) => {
                warn!(graph_id = %req.graph_id, "schema application failed ({e}), applying fallback schema");
                apply_statements(&mut handle, &SchemaCatalog::fallback().to_ddl(), req.schema_type)
                    .map_err(|e| Error::QueryFailure(e.to_string()))?;
                "fallback"
            }
        };

        drop(handle);

        let staging_dir = path
            .parent()
            .map(|p| p.join(format!("{}.staging_dir", req.graph_id)));
        if let Some(dir) = staging_dir {
            std::fs::create_dir_all(&dir)
                .map_err(|e| Error::ConnectionFailure(format!("staging dir: {e}")))?;
        }

        Ok(applied)
    }

    /// spec §4.4 `delete_database`.
    pub async fn delete_database(&self, graph_id: &GraphId) -> Result<(), Error> {
        let path = graphnode_utils::graph_path(&self.base_path, graph_id)?;
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "graph database '{graph_id}' does not exist"
            )));
        }

        self.pool.close_database_connections(graph_id).await;
        std::fs::remove_file(&path)
            .map_err(|e| Error::ConnectionFailure(format!("failed to remove {path:?}: {e}")))?;

        self.ledger.write().await.counted.remove(graph_id);
        info!(graph_id = %graph_id, "graph database deleted");
        Ok(())
    }

    /// spec §4.4 `get_database_info`.
    pub async fn get_database_info(&self, graph_id: &GraphId) -> Result<DatabaseInfo, Error> {
        let path = graphnode_utils::graph_path(&self.base_path, graph_id)?;
        let metadata = std::fs::metadata(&path)
            .map_err(|_| Error::NotFound(format!("graph database '{graph_id}' does not exist")))?;

        let mut conn = self.pool.get_connection(graph_id, true).await?;
        let is_healthy = conn.health_check().unwrap_or(false);

        Ok(DatabaseInfo {
            graph_id: graph_id.clone(),
            file_size_bytes: metadata.len(),
            is_healthy,
        })
    }

    /// spec §4.4 `list_databases`.
    pub async fn list_databases(&self) -> Vec<GraphId> {
        self.ledger.read().await.counted.keys().cloned().collect()
    }

    /// spec §4.4 `get_all_databases_info`.
    pub async fn get_all_databases_info(&self) -> Vec<DatabaseInfo> {
        let ids = self.list_databases().await;
        let mut infos = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(info) = self.get_database_info(&id).await {
                infos.push(info);
            }
        }
        infos
    }

    /// spec §4.4 `health_check_all`.
    pub async fn health_check_all(&self) -> HashMap<GraphId, bool> {
        let ids = self.list_databases().await;
        let mut results = HashMap::with_capacity(ids.len());
        for id in ids {
            let healthy = match self.pool.get_connection(&id, true).await {
                Ok(mut conn) => conn.health_check().unwrap_or(false),
                Err(_) => false,
            };
            results.insert(id, healthy);
        }
        results
    }

    pub async fn capacity(&self) -> CapacitySnapshot {
        let ledger = self.ledger.read().await;
        let current = ledger.counted.len() as u32;
        let max = ledger.max_databases_per_node;
        let remaining = max.saturating_sub(current);
        let utilization_percent = if max == 0 {
            0.0
        } else {
            (current as f64 / max as f64) * 100.0
        };
        CapacitySnapshot {
            max_databases: max,
            current_databases: current,
            capacity_remaining: remaining,
            utilization_percent,
        }
    }

    async fn check_capacity(&self) -> Result<(), Error> {
        let ledger = self.ledger.read().await;
        let current = ledger.counted.len() as u32;
        if current >= ledger.max_databases_per_node {
            return Err(Error::CapacityExceeded {
                current,
                max: ledger.max_databases_per_node,
            });
        }
        Ok(())
    }
}

/// Applies `statements` in order, ignoring "already exists" failures for
/// `entity`/`shared` schemas (spec §4.4: "ignore 'already exists' errors"),
/// but aborting on the first failure for a `custom` schema (spec §4.4:
/// "if any fails, abort and surface the error").
fn apply_statements(
    handle: &mut dyn GraphEngine,
    statements: &[String],
    schema_type: SchemaType,
) -> Result<(), anyhow::Error> {
    for stmt in statements {
        if let Err(e) = handle.execute(stmt) {
            let already_exists = e.to_string().to_lowercase().contains("already exists");
            if schema_type == SchemaType::Custom || !already_exists {
                return Err(e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineTuning, GraphEngine, QueryOutcome};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeEngine {
        fail_next: bool,
        executed: Arc<AtomicUsize>,
    }

    impl GraphEngine for FakeEngine {
        fn open(_path: &Path, _tuning: EngineTuning) -> anyhow::Result<Self> {
            Ok(Self {
                fail_next: false,
                executed: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn execute(&mut self, _cypher: &str) -> anyhow::Result<QueryOutcome> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            if self.fail_next {
                anyhow::bail!("boom");
            }
            Ok(QueryOutcome::default())
        }
    }

    #[test]
    fn apply_statements_ignores_already_exists_for_entity() {
        let mut engine = FakeEngine {
            fail_next: false,
            executed: Arc::new(AtomicUsize::new(0)),
        };
        let statements = vec!["CREATE NODE TABLE IF NOT EXISTS Entity (...)".to_string()];
        assert!(apply_statements(&mut engine, &statements, SchemaType::Entity).is_ok());
    }

    #[tokio::test]
    async fn capacity_rejects_once_at_max() {
        let ledger = CapacityLedger {
            max_databases_per_node: 1,
            counted: HashMap::new(),
        };
        let lock = RwLock::new(ledger);
        {
            let mut guard = lock.write().await;
            guard.counted.insert(GraphId::parse("g1").unwrap(), ());
        }
        let guard = lock.read().await;
        assert_eq!(guard.counted.len(), 1);
        assert!(guard.counted.len() as u32 >= guard.max_databases_per_node);
    }
}
