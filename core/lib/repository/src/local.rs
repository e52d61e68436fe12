//! Direct in-process variant of the repository facade: no suspension other
//! than pool acquisition (spec §4.9, §5: "direct-file operations do not
//! suspend on network I/O").

use std::time::Instant;

use graphnode_basic_types::{Error, GraphId};
use graphnode_graph_store::{GraphConnectionPool, QueryOutcome};

use crate::stream::{slice_into_chunks, RepoStreamChunk};

pub struct LocalRepository {
    graph_id: GraphId,
    pool: GraphConnectionPool,
}

impl LocalRepository {
    pub fn new(graph_id: GraphId, pool: GraphConnectionPool) -> Self {
        Self { graph_id, pool }
    }

    pub async fn execute_query(&self, cypher: &str) -> Result<QueryOutcome, Error> {
        let mut conn = self.pool.get_connection(&self.graph_id, false).await?;
        conn.execute(cypher).map_err(|e| Error::QueryFailure(e.to_string()))
    }

    /// spec §4.9, §5: statements run in order; the first failure aborts the
    /// rest (single-writer embedded engine, no nested transaction API
    /// exposed through [`graphnode_graph_store::GraphEngine`]).
    pub async fn execute_transaction(&self, statements: &[String]) -> Result<(), Error> {
        let mut conn = self.pool.get_connection(&self.graph_id, false).await?;
        for statement in statements {
            conn.execute(statement)
                .map_err(|e| Error::QueryFailure(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn health_check(&self) -> Result<bool, Error> {
        let mut conn = self.pool.get_connection(&self.graph_id, true).await?;
        conn.health_check().map_err(|e| Error::ConnectionFailure(e.to_string()))
    }

    pub async fn close(&self) {
        self.pool.close_database_connections(&self.graph_id).await;
    }

    /// The embedded engine has no native result cursor in
    /// [`graphnode_graph_store::GraphEngine`], so this is always the
    /// non-streaming fallback: run the query, slice the result.
    pub async fn execute_query_streaming(
        &self,
        cypher: &str,
        chunk_size: usize,
        mut sink: impl FnMut(RepoStreamChunk) + Send + 'static,
    ) -> Result<(), Error> {
        let started = Instant::now();
        let outcome = self.execute_query(cypher).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        slice_into_chunks(outcome, chunk_size, elapsed_ms, &mut sink);
        Ok(())
    }
}
