//! HTTP client variant of the repository facade: every operation suspends
//! on network I/O (spec §4.9, §5). Grounded on the teacher's
//! `core_api_client.rs` shape — a thin `reqwest::Client` wrapper keyed by a
//! base address, one method per remote operation, no connection pooling of
//! its own (`reqwest::Client` already pools HTTP connections internally).

use std::time::Instant;

use graphnode_basic_types::{Error, GraphId};
use graphnode_graph_store::{QueryOutcome, QueryRow, ScalarValue};
use serde::{Deserialize, Serialize};

use crate::stream::{passthrough_chunk, RepoStreamChunk};

#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    cypher: &'a str,
}

#[derive(Debug, Serialize)]
struct TransactionRequest<'a> {
    statements: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ScalarWire {
    #[serde(rename = "type")]
    kind: String,
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    columns: Vec<String>,
    rows: Vec<Vec<ScalarWire>>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    healthy: bool,
}

/// NDJSON event shape for `POST /databases/{G}/tables/query` (spec §6.2):
/// one JSON object per line, tagged by `event`.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum StreamEvent {
    Started,
    Chunk {
        columns: Option<Vec<String>>,
        rows: Vec<Vec<ScalarWire>>,
        chunk_index: u64,
        is_last_chunk: bool,
    },
    Progress,
    Completed,
    Error {
        message: String,
    },
}

fn wire_to_scalar(wire: ScalarWire) -> ScalarValue {
    match wire.kind.as_str() {
        "null" => ScalarValue::Null,
        "bool" => ScalarValue::Bool(wire.value.as_bool().unwrap_or(false)),
        "int" => ScalarValue::Int(wire.value.as_i64().unwrap_or(0)),
        "float" => ScalarValue::Float(wire.value.as_f64().unwrap_or(0.0)),
        _ => ScalarValue::Text(wire.value.as_str().unwrap_or_default().to_string()),
    }
}

pub struct RemoteRepository {
    graph_id: GraphId,
    client: RemoteClient,
}

impl RemoteRepository {
    pub fn new(graph_id: GraphId, client: RemoteClient) -> Self {
        Self { graph_id, client }
    }

    fn table_query_url(&self) -> String {
        format!(
            "{}/databases/{}/tables/query",
            self.client.base_url, self.graph_id
        )
    }

    pub async fn execute_query(&self, cypher: &str) -> Result<QueryOutcome, Error> {
        let resp = self
            .client
            .client
            .post(self.table_query_url())
            .header("accept", "application/json")
            .json(&QueryRequest { cypher })
            .send()
            .await
            .map_err(|e| Error::ConnectionFailure(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::QueryFailure(format!(
                "remote query failed with status {}",
                resp.status()
            )));
        }

        let body: QueryResponse = resp
            .json()
            .await
            .map_err(|e| Error::QueryFailure(format!("malformed response: {e}")))?;

        Ok(QueryOutcome {
            columns: body.columns,
            rows: body
                .rows
                .into_iter()
                .map(|r| QueryRow(r.into_iter().map(wire_to_scalar).collect()))
                .collect(),
            summary: None,
        })
    }

    pub async fn execute_transaction(&self, statements: &[String]) -> Result<(), Error> {
        let url = format!(
            "{}/databases/{}/transaction",
            self.client.base_url, self.graph_id
        );
        let resp = self
            .client
            .client
            .post(url)
            .json(&TransactionRequest { statements })
            .send()
            .await
            .map_err(|e| Error::ConnectionFailure(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::QueryFailure(format!(
                "remote transaction failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    pub async fn health_check(&self) -> Result<bool, Error> {
        let url = format!("{}/health", self.client.base_url);
        let resp = self
            .client
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ConnectionFailure(e.to_string()))?;

        if !resp.status().is_success() {
            return Ok(false);
        }
        let body: HealthResponse = resp
            .json()
            .await
            .map_err(|e| Error::ConnectionFailure(format!("malformed health response: {e}")))?;
        Ok(body.healthy)
    }

    /// Native streaming: the server already emits chunk boundaries as NDJSON
    /// lines, so each line is passed through with only missing fields
    /// filled in (spec §4.9: "pass chunks through without buffering").
    pub async fn execute_query_streaming(
        &self,
        cypher: &str,
        _chunk_size: usize,
        mut sink: impl FnMut(RepoStreamChunk) + Send + 'static,
    ) -> Result<(), Error> {
        use futures::StreamExt;

        let started = Instant::now();
        let resp = self
            .client
            .client
            .post(self.table_query_url())
            .header("accept", "application/x-ndjson")
            .json(&QueryRequest { cypher })
            .send()
            .await
            .map_err(|e| Error::ConnectionFailure(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::QueryFailure(format!(
                "remote streaming query failed with status {}",
                resp.status()
            )));
        }

        let mut byte_stream = resp.bytes_stream();
        let mut buffer = Vec::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(|e| Error::ConnectionFailure(e.to_string()))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = &line[..line.len().saturating_sub(1)];
                if line.is_empty() {
                    continue;
                }
                let event: StreamEvent = serde_json::from_slice(line)
                    .map_err(|e| Error::QueryFailure(format!("malformed stream event: {e}")))?;

                match event {
                    StreamEvent::Chunk {
                        columns,
                        rows,
                        chunk_index,
                        is_last_chunk,
                    } => {
                        let rows = rows
                            .into_iter()
                            .map(|r| QueryRow(r.into_iter().map(wire_to_scalar).collect()))
                            .collect();
                        sink(passthrough_chunk(
                            columns,
                            rows,
                            chunk_index,
                            is_last_chunk,
                            started.elapsed().as_millis() as u64,
                        ));
                    }
                    StreamEvent::Error { message } => return Err(Error::QueryFailure(message)),
                    StreamEvent::Started | StreamEvent::Progress | StreamEvent::Completed => {}
                }
            }
        }

        Ok(())
    }
}
