//! Per-database bounded pool of embedded staging connections (spec §4.3),
//! structurally identical to `graphnode_graph_store::pool` — same
//! per-key/global lock split grounded on
//! `original_source/.../duckdb_pool.py` — but the database file itself
//! persists for the life of the graph: there is no `force_cleanup` call
//! here except the one the graph-database manager drives on delete (spec
//! §4.3: "age-based auto-deletion ... explicitly disabled").

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use graphnode_basic_types::{Error, GraphId};
use tokio::sync::Mutex as AsyncMutex;
use vlog::{debug, warn};

use crate::engine::{DuckDbConnection, ObjectStoreCredentials, StagingEngine, StagingTuning};

struct Conn {
    handle: Box<dyn StagingEngine>,
    created_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
    is_healthy: bool,
}

impl Conn {
    fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.created_at + ttl < now
    }
}

struct PerDbState {
    conns: Vec<Conn>,
}

struct Inner {
    base_path: PathBuf,
    max_connections_per_db: u32,
    ttl: chrono::Duration,
    health_check_interval: chrono::Duration,
    cleanup_interval: chrono::Duration,
    thread_count: u32,
    memory_limit_mb: u64,
    credentials: ObjectStoreCredentials,

    locks: AsyncMutex<HashMap<GraphId, Arc<AsyncMutex<PerDbState>>>>,
    last_cleanup: AsyncMutex<DateTime<Utc>>,
    last_health_check: AsyncMutex<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct StagingConnectionPool {
    inner: Arc<Inner>,
}

impl StagingConnectionPool {
    pub fn new(
        base_path: PathBuf,
        max_connections_per_db: u32,
        ttl_minutes: u64,
        health_check_interval_minutes: u64,
        cleanup_interval_minutes: u64,
        thread_count: u32,
        memory_limit_mb: u64,
        credentials: ObjectStoreCredentials,
    ) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(Inner {
                base_path,
                max_connections_per_db,
                ttl: chrono::Duration::minutes(ttl_minutes as i64),
                health_check_interval: chrono::Duration::minutes(
                    health_check_interval_minutes as i64,
                ),
                cleanup_interval: chrono::Duration::minutes(cleanup_interval_minutes as i64),
                thread_count,
                memory_limit_mb,
                credentials,
                locks: AsyncMutex::new(HashMap::new()),
                last_cleanup: AsyncMutex::new(now),
                last_health_check: AsyncMutex::new(now),
            }),
        }
    }

    pub async fn get_connection(&self, graph_id: &GraphId) -> Result<PooledStagingConnection, Error> {
        self.maybe_run_maintenance().await;

        let state_lock = self.db_lock(graph_id).await;
        let mut state = state_lock.lock().await;

        if let Some(conn) = self.take_reusable(&mut state.conns) {
            return Ok(PooledStagingConnection::new(conn, state_lock.clone()));
        }

        if state.conns.len() as u32 >= self.inner.max_connections_per_db {
            self.evict_oldest(&mut state.conns);
        }

        let conn = self.open_new(graph_id).await?;
        Ok(PooledStagingConnection::new(conn, state_lock.clone()))
    }

    pub async fn close_database_connections(&self, graph_id: &GraphId) {
        let state_lock = self.db_lock(graph_id).await;
        state_lock.lock().await.conns.clear();
    }

    pub async fn invalidate_connection(&self, graph_id: &GraphId) {
        self.close_database_connections(graph_id).await;
    }

    /// Close-all + unlink the `G.staging` file and its sibling WAL. Driven
    /// exclusively by the graph-database manager when a graph is deleted
    /// (spec §4.3), never by this pool's own maintenance loop.
    pub async fn force_database_cleanup(&self, graph_id: &GraphId) -> Result<(), Error> {
        self.close_database_connections(graph_id).await;

        let path = graphnode_utils::staging_path(&self.inner.base_path, graph_id)?;
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| Error::ConnectionFailure(format!("failed to remove {path:?}: {e}")))?;
        }
        let wal = path.with_extension("staging.wal");
        if wal.exists() {
            if let Err(e) = std::fs::remove_file(&wal) {
                warn!(graph_id = %graph_id, "failed to remove staging WAL sibling {wal:?}: {e}");
            }
        }
        Ok(())
    }

    async fn db_lock(&self, graph_id: &GraphId) -> Arc<AsyncMutex<PerDbState>> {
        let mut locks = self.inner.locks.lock().await;
        locks
            .entry(graph_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(PerDbState { conns: Vec::new() })))
            .clone()
    }

    fn take_reusable(&self, conns: &mut Vec<Conn>) -> Option<Conn> {
        let now = Utc::now();
        let ttl = self.inner.ttl;
        let best_idx = conns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_healthy && !c.is_expired(ttl, now))
            .min_by_key(|(_, c)| c.last_used)
            .map(|(idx, _)| idx);

        best_idx.map(|idx| {
            let mut conn = conns.remove(idx);
            conn.last_used = now;
            conn
        })
    }

    fn evict_oldest(&self, conns: &mut Vec<Conn>) {
        if let Some((idx, _)) = conns.iter().enumerate().min_by_key(|(_, c)| c.created_at) {
            conns.remove(idx);
        }
    }

    async fn open_new(&self, graph_id: &GraphId) -> Result<Conn, Error> {
        let path = graphnode_utils::staging_path(&self.inner.base_path, graph_id)?;
        let tuning = StagingTuning {
            thread_count: self.inner.thread_count,
            memory_limit_mb: self.inner.memory_limit_mb,
            credentials: self.inner.credentials.clone(),
        };

        let handle = tokio::task::spawn_blocking(move || DuckDbConnection::open(&path, &tuning))
            .await
            .map_err(|e| Error::ConnectionFailure(format!("connection open task panicked: {e}")))?
            .map_err(|e| Error::ConnectionFailure(e.to_string()))?;

        let now = Utc::now();
        Ok(Conn {
            handle: Box::new(handle),
            created_at: now,
            last_used: now,
            is_healthy: true,
        })
    }

    async fn maybe_run_maintenance(&self) {
        let now = Utc::now();
        let run_cleanup = {
            let mut last = self.inner.last_cleanup.lock().await;
            if now - *last >= self.inner.cleanup_interval {
                *last = now;
                true
            } else {
                false
            }
        };
        let run_health_check = {
            let mut last = self.inner.last_health_check.lock().await;
            if now - *last >= self.inner.health_check_interval {
                *last = now;
                true
            } else {
                false
            }
        };
        if !run_cleanup && !run_health_check {
            return;
        }

        let keys: Vec<GraphId> = self.inner.locks.lock().await.keys().cloned().collect();
        for graph_id in keys {
            let state_lock = self.db_lock(&graph_id).await;
            let mut state = state_lock.lock().await;

            if run_cleanup {
                let ttl = self.inner.ttl;
                let before = state.conns.len();
                state.conns.retain(|c| !c.is_expired(ttl, now));
                if before != state.conns.len() {
                    debug!(graph_id = %graph_id, "cleaned up expired staging connections");
                }
            }
            if run_health_check {
                for conn in state.conns.iter_mut() {
                    conn.is_healthy = conn.handle.health_check().unwrap_or(false);
                }
                state.conns.retain(|c| c.is_healthy);
            }
        }
    }
}

pub struct PooledStagingConnection {
    conn: Option<Conn>,
    state: Arc<AsyncMutex<PerDbState>>,
}

impl PooledStagingConnection {
    fn new(conn: Conn, state: Arc<AsyncMutex<PerDbState>>) -> Self {
        Self {
            conn: Some(conn),
            state,
        }
    }
}

impl Deref for PooledStagingConnection {
    type Target = dyn StagingEngine;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("conn present until drop").handle.as_ref()
    }
}

impl DerefMut for PooledStagingConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("conn present until drop").handle.as_mut()
    }
}

impl Drop for PooledStagingConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let state = self.state.clone();
            tokio::spawn(async move {
                state.lock().await.conns.push(conn);
            });
        }
    }
}
