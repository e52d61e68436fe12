//! Per-database bounded pool of embedded graph connections (spec §4.2),
//! grounded on the `ConnectionPool`/`ConnectionHolder` split in
//! `core/lib/storage/src/connection/{mod,holder}.rs`: the teacher wraps a
//! `deadpool` pool of `PgConnection`s behind a small API surface, acquiring
//! through `access_storage()`. This pool does the analogous thing for a
//! per-`graph_id` keyed set of pools, since `deadpool` itself doesn't model
//! "one pool per key" — that part is grounded on
//! `original_source/.../duckdb_pool.py`'s `_locks` / `_pools` dictionaries,
//! translated from Python's `threading.RLock` per key into a
//! `tokio::sync::Mutex` per key plus one short-held global lock over the
//! key→lock map.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use graphnode_basic_types::{Error, GraphId};
use tokio::sync::Mutex as AsyncMutex;
use vlog::{debug, warn};

use crate::connection::Conn;
use crate::engine::{EngineTuning, GraphEngine, KuzuConnection};

/// `checkpoint_threshold` override for a well-known "large shared" database
/// (spec §4.2, §9: "the source checkpoint threshold for the 'sec' database
/// is hard-coded by name match"). The spec formalizes this as a
/// configurable per-database override rather than a single hard-coded name;
/// callers pass the set in, defaulting to the one entry the source had.
#[derive(Debug, Clone)]
pub struct CheckpointOverrides {
    /// graph_id -> checkpoint threshold in bytes, e.g. `{"sec": 128 MiB}`.
    overrides: HashMap<String, u64>,
    default_threshold_bytes: u64,
}

impl CheckpointOverrides {
    pub fn new(default_threshold_bytes: u64) -> Self {
        Self {
            overrides: HashMap::new(),
            default_threshold_bytes,
        }
    }

    pub fn with_override(mut self, graph_id: impl Into<String>, threshold_bytes: u64) -> Self {
        self.overrides.insert(graph_id.into(), threshold_bytes);
        self
    }

    pub fn threshold_for(&self, graph_id: &GraphId) -> u64 {
        self.overrides
            .get(graph_id.as_str())
            .copied()
            .unwrap_or(self.default_threshold_bytes)
    }
}

impl Default for CheckpointOverrides {
    /// Matches the source's single hard-coded entry: a 128MB threshold for
    /// `graph_id == "sec"`, 512MB otherwise.
    fn default() -> Self {
        Self::new(512 * 1024 * 1024).with_override("sec", 128 * 1024 * 1024)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub connections_created: u64,
    pub connections_reused: u64,
    pub connections_closed: u64,
    pub health_checks: u64,
    pub health_failures: u64,
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
    buffer_pool_bytes: u64,
    checkpoints: CheckpointOverrides,

    // The global lock: short-held, only ever guards the key→lock map itself,
    // never a connection operation.
    locks: AsyncMutex<HashMap<GraphId, Arc<AsyncMutex<PerDbState>>>>,
    last_cleanup: AsyncMutex<DateTime<Utc>>,
    last_health_check: AsyncMutex<DateTime<Utc>>,
    stats: AsyncMutex<PoolStats>,
}

/// Thread-safe connection pool for embedded graph databases, one pool of
/// connections per `graph_id`.
#[derive(Clone)]
pub struct GraphConnectionPool {
    inner: Arc<Inner>,
}

impl GraphConnectionPool {
    pub fn new(
        base_path: PathBuf,
        max_connections_per_db: u32,
        ttl_minutes: u64,
        health_check_interval_minutes: u64,
        cleanup_interval_minutes: u64,
        buffer_pool_bytes: u64,
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
                buffer_pool_bytes,
                checkpoints: CheckpointOverrides::default(),
                locks: AsyncMutex::new(HashMap::new()),
                last_cleanup: AsyncMutex::new(now),
                last_health_check: AsyncMutex::new(now),
                stats: AsyncMutex::new(PoolStats::default()),
            }),
        }
    }

    pub async fn stats(&self) -> PoolStats {
        *self.inner.stats.lock().await
    }

    /// Acquires a connection for `graph_id`, creating one if the pool is
    /// empty or every existing connection is unhealthy/expired (spec §4.2).
    pub async fn get_connection(
        &self,
        graph_id: &GraphId,
        read_only: bool,
    ) -> Result<PooledConnection, Error> {
        self.maybe_run_maintenance().await;

        let state_lock = self.db_lock(graph_id).await;
        let mut state = state_lock.lock().await;

        if let Some(conn) = self.take_reusable(&mut state.conns) {
            let mut stats = self.inner.stats.lock().await;
            stats.connections_reused += 1;
            drop(stats);
            return Ok(PooledConnection::new(conn, state_lock.clone()));
        }

        if state.conns.len() as u32 >= self.inner.max_connections_per_db {
            self.evict_oldest(&mut state.conns);
        }

        let conn = self.open_new(graph_id, read_only).await?;
        let mut stats = self.inner.stats.lock().await;
        stats.connections_created += 1;
        drop(stats);
        Ok(PooledConnection::new(conn, state_lock.clone()))
    }

    /// Closes and drops every `Conn` for `graph_id` (used by delete and
    /// rebuild).
    pub async fn close_database_connections(&self, graph_id: &GraphId) {
        let state_lock = self.db_lock(graph_id).await;
        let mut state = state_lock.lock().await;
        let closed = state.conns.len();
        state.conns.clear();
        if closed > 0 {
            let mut stats = self.inner.stats.lock().await;
            stats.connections_closed += closed as u64;
        }
    }

    /// Close-all without deletion; next acquisition creates a fresh
    /// connection.
    pub async fn invalidate_connection(&self, graph_id: &GraphId) {
        self.close_database_connections(graph_id).await;
    }

    /// Close-all + unlink the database file and its WAL sibling.
    /// Filesystem errors on the WAL sibling are logged but not fatal
    /// (spec §4.2).
    pub async fn force_database_cleanup(&self, graph_id: &GraphId) -> Result<(), Error> {
        self.close_database_connections(graph_id).await;

        let path = graphnode_utils::graph_path(&self.inner.base_path, graph_id)?;
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| Error::ConnectionFailure(format!("failed to remove {path:?}: {e}")))?;
        }
        let wal = path.with_extension("graph.wal");
        if wal.exists() {
            if let Err(e) = std::fs::remove_file(&wal) {
                warn!(graph_id = %graph_id, "failed to remove WAL sibling {wal:?}: {e}");
            }
        }
        Ok(())
    }

    /// Resolves the checkpoint-threshold override for `graph_id`, the same
    /// value a pool-acquired connection for this database receives (spec
    /// §4.2, §9) — callers that bootstrap a database outside the pool (e.g.
    /// `GraphDatabaseManager::create_database_inner`) use this to stay
    /// consistent with later pool-opened connections.
    pub fn checkpoint_threshold_bytes(&self, graph_id: &GraphId) -> u64 {
        self.inner.checkpoints.threshold_for(graph_id)
    }

    /// Acquires the per-`graph_id` lock and holds it until `f`'s future
    /// resolves, serializing callers against each other and against
    /// pool-internal operations for the same database (spec §3.2: "at most
    /// one live create or delete per graph_id ... serialized by the
    /// per-database lock in the connection pool"). `f` must not itself call
    /// back into a pool method that acquires this same lock (e.g.
    /// `get_connection`), or it will deadlock.
    pub async fn with_graph_lock<F, Fut, T>(&self, graph_id: &GraphId, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let state_lock = self.db_lock(graph_id).await;
        let _guard = state_lock.lock().await;
        f().await
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
            conn.mark_used();
            conn
        })
    }

    fn evict_oldest(&self, conns: &mut Vec<Conn>) {
        if let Some((idx, _)) = conns
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.created_at)
        {
            conns.remove(idx);
        }
    }

    async fn open_new(&self, graph_id: &GraphId, read_only: bool) -> Result<Conn, Error> {
        let path = graphnode_utils::graph_path(&self.inner.base_path, graph_id)?;
        let tuning = EngineTuning {
            buffer_pool_bytes: self.inner.buffer_pool_bytes,
            checkpoint_threshold_bytes: self.inner.checkpoints.threshold_for(graph_id),
            read_only,
        };

        let graph_id_owned = graph_id.clone();
        let handle = tokio::task::spawn_blocking(move || KuzuConnection::open(&path, tuning))
            .await
            .map_err(|e| Error::ConnectionFailure(format!("connection open task panicked: {e}")))?
            .map_err(|e| Error::ConnectionFailure(e.to_string()))?;

        Ok(Conn::new(graph_id_owned, Box::new(handle)))
    }

    /// Opportunistic maintenance, run on each acquisition when the
    /// configured interval has elapsed (spec §4.2, §9: "cleanups run at
    /// least as often as `cleanup_interval`"). Cleanup and health-check
    /// both iterate every per-database pool; the global lock is only held
    /// long enough to snapshot the list of keys.
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
                let closed = before - state.conns.len();
                if closed > 0 {
                    debug!(graph_id = %graph_id, closed, "cleaned up expired connections");
                    self.inner.stats.lock().await.connections_closed += closed as u64;
                }
            }

            if run_health_check {
                for conn in state.conns.iter_mut() {
                    let healthy = conn.handle.health_check().unwrap_or(false);
                    conn.is_healthy = healthy;
                    self.inner.stats.lock().await.health_checks += 1;
                    if !healthy {
                        self.inner.stats.lock().await.health_failures += 1;
                    }
                }
                state.conns.retain(|c| c.is_healthy);
            }
        }
    }
}

/// A scoped acquisition of a [`Conn`]. Deref/DerefMut expose the engine
/// handle directly; dropping the guard returns the connection to its pool
/// on every exit path, including an early `?` return from the caller,
/// without closing it.
pub struct PooledConnection {
    conn: Option<Conn>,
    state: Arc<AsyncMutex<PerDbState>>,
}

impl PooledConnection {
    fn new(conn: Conn, state: Arc<AsyncMutex<PerDbState>>) -> Self {
        Self {
            conn: Some(conn),
            state,
        }
    }

    pub fn graph_id(&self) -> &GraphId {
        &self.conn.as_ref().expect("conn present until drop").graph_id
    }
}

impl Deref for PooledConnection {
    type Target = dyn GraphEngine;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("conn present until drop").handle.as_ref()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("conn present until drop").handle.as_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let state = self.state.clone();
            tokio::spawn(async move {
                state.lock().await.conns.push(conn);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_override_matches_known_database() {
        let overrides = CheckpointOverrides::default();
        let sec = GraphId::parse("sec").unwrap();
        let other = GraphId::parse("kg_demo").unwrap();
        assert_eq!(overrides.threshold_for(&sec), 128 * 1024 * 1024);
        assert_eq!(overrides.threshold_for(&other), 512 * 1024 * 1024);
    }
}
