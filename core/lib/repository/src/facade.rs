//! The repository facade (spec §4.9): one interface over either a local
//! in-process engine or a remote HTTP client. REDESIGN FLAGS: the dynamic
//! sync-or-async introspection the distilled spec describes becomes a
//! sealed two-variant enum here, with the single `execute_query`-style
//! method defined once per variant and the public API matching on it —
//! callers never need to know which side they hold.

use graphnode_basic_types::{Error, GraphId};
use graphnode_graph_store::{GraphConnectionPool, QueryOutcome, QueryRow, ScalarValue};

use crate::local::LocalRepository;
use crate::remote::{RemoteClient, RemoteRepository};
use crate::stream::RepoStreamChunk;

pub enum Repository {
    Local(LocalRepository),
    Remote(RemoteRepository),
}

impl Repository {
    pub fn local(graph_id: GraphId, pool: GraphConnectionPool) -> Self {
        Repository::Local(LocalRepository::new(graph_id, pool))
    }

    pub fn remote(graph_id: GraphId, client: RemoteClient) -> Self {
        Repository::Remote(RemoteRepository::new(graph_id, client))
    }

    pub async fn execute_query(&self, cypher: &str) -> Result<QueryOutcome, Error> {
        match self {
            Repository::Local(r) => r.execute_query(cypher).await,
            Repository::Remote(r) => r.execute_query(cypher).await,
        }
    }

    pub async fn execute_single(&self, cypher: &str) -> Result<Option<QueryRow>, Error> {
        Ok(self.execute_query(cypher).await?.rows.into_iter().next())
    }

    pub async fn execute_transaction(&self, statements: &[String]) -> Result<(), Error> {
        match self {
            Repository::Local(r) => r.execute_transaction(statements).await,
            Repository::Remote(r) => r.execute_transaction(statements).await,
        }
    }

    /// `MATCH (n:<table>) RETURN count(n)`. `table` must already be a
    /// validated identifier; this does not re-validate it.
    pub async fn count_nodes(&self, table: &str) -> Result<u64, Error> {
        let cypher = format!("MATCH (n:{table}) RETURN count(n) AS c");
        let outcome = self.execute_query(&cypher).await?;
        Ok(first_count(&outcome))
    }

    pub async fn node_exists(&self, table: &str, identifier: &str) -> Result<bool, Error> {
        let escaped = identifier.replace('\\', "\\\\").replace('\'', "\\'");
        let cypher = format!("MATCH (n:{table} {{identifier: '{escaped}'}}) RETURN count(n) AS c");
        let outcome = self.execute_query(&cypher).await?;
        Ok(first_count(&outcome) > 0)
    }

    pub async fn health_check(&self) -> Result<bool, Error> {
        match self {
            Repository::Local(r) => r.health_check().await,
            Repository::Remote(r) => r.health_check().await,
        }
    }

    pub async fn close(&self) -> Result<(), Error> {
        match self {
            Repository::Local(r) => {
                r.close().await;
                Ok(())
            }
            Repository::Remote(_) => Ok(()),
        }
    }

    /// spec §4.9: native pass-through when the variant supports it (remote),
    /// slice-the-result fallback otherwise (local).
    pub async fn execute_query_streaming(
        &self,
        cypher: &str,
        chunk_size: usize,
        sink: impl FnMut(RepoStreamChunk) + Send + 'static,
    ) -> Result<(), Error> {
        match self {
            Repository::Local(r) => r.execute_query_streaming(cypher, chunk_size, sink).await,
            Repository::Remote(r) => r.execute_query_streaming(cypher, chunk_size, sink).await,
        }
    }
}

fn first_count(outcome: &QueryOutcome) -> u64 {
    outcome
        .rows
        .first()
        .and_then(|r| r.0.first())
        .and_then(ScalarValue::as_i64)
        .unwrap_or(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphnode_graph_store::QueryRow as Row;

    #[test]
    fn first_count_reads_leading_scalar() {
        let outcome = QueryOutcome {
            columns: vec!["c".into()],
            rows: vec![Row(vec![ScalarValue::Int(3)])],
            summary: None,
        };
        assert_eq!(first_count(&outcome), 3);
    }

    #[test]
    fn first_count_defaults_to_zero_on_empty_result() {
        let outcome = QueryOutcome {
            columns: vec!["c".into()],
            rows: vec![],
            summary: None,
        };
        assert_eq!(first_count(&outcome), 0);
    }
}
