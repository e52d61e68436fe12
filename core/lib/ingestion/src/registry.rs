//! Collaborator traits for the registries the ingestion pipeline consults
//! but does not own (spec §4.6 names "the external graph metadata", "the
//! graph-schema registry", and "the external file registry"; REDESIGN
//! FLAGS: pass module-level-singleton collaborators as explicit
//! constructor dependencies instead).

use graphnode_basic_types::{Error, GraphId, TableName};

/// Persisted DDL a graph database was created with, replayed verbatim
/// during a rebuild (spec §4.6 step 1).
#[async_trait::async_trait]
pub trait GraphSchemaRegistry: Send + Sync {
    async fn ddl_statements(&self, graph_id: &GraphId) -> Result<Vec<String>, Error>;
}

/// The object-storage file registry: which staging tables a graph is
/// supposed to have, and whose files live under `user_id/G/T/**/*.parquet`
/// (spec §4.6 step 1).
#[async_trait::async_trait]
pub trait FileRegistry: Send + Sync {
    async fn known_tables(&self, graph_id: &GraphId) -> Result<Vec<TableName>, Error>;
    async fn user_id_for(&self, graph_id: &GraphId) -> Result<String, Error>;
}

/// External graph metadata state transitions the pipeline reports during a
/// rebuild (spec §4.6 step 7: `status=rebuilding` / `available` /
/// `rebuild_failed`, `last_rebuild_duration_seconds`, backup key on
/// failure).
#[async_trait::async_trait]
pub trait RebuildMetadataSink: Send + Sync {
    async fn mark_rebuilding(&self, graph_id: &GraphId);
    async fn mark_available(&self, graph_id: &GraphId, duration: std::time::Duration);
    async fn mark_rebuild_failed(&self, graph_id: &GraphId, backup_key: Option<String>);
}

/// Placeholder used where no real schema registry is wired in yet; any
/// rebuild against it fails loudly rather than silently replaying no DDL.
pub struct NullSchemaRegistry;

#[async_trait::async_trait]
impl GraphSchemaRegistry for NullSchemaRegistry {
    async fn ddl_statements(&self, graph_id: &GraphId) -> Result<Vec<String>, Error> {
        Err(Error::NotFound(format!(
            "no schema registry configured, cannot replay DDL for '{graph_id}'"
        )))
    }
}

/// Placeholder file registry reporting no known tables; a rebuild against it
/// recreates the graph database itself but re-registers nothing.
pub struct NullFileRegistry;

#[async_trait::async_trait]
impl FileRegistry for NullFileRegistry {
    async fn known_tables(&self, _graph_id: &GraphId) -> Result<Vec<TableName>, Error> {
        Ok(Vec::new())
    }

    async fn user_id_for(&self, graph_id: &GraphId) -> Result<String, Error> {
        Err(Error::NotFound(format!(
            "no file registry configured, cannot resolve user id for '{graph_id}'"
        )))
    }
}

pub struct NullRebuildMetadataSink;

#[async_trait::async_trait]
impl RebuildMetadataSink for NullRebuildMetadataSink {
    async fn mark_rebuilding(&self, _graph_id: &GraphId) {}
    async fn mark_available(&self, _graph_id: &GraphId, _duration: std::time::Duration) {}
    async fn mark_rebuild_failed(&self, _graph_id: &GraphId, _backup_key: Option<String>) {}
}
