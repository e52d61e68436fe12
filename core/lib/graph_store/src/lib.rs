//! Per-node manager and connection pool for embedded Cypher graph
//! databases (spec §4.2, §4.4).

pub mod connection;
pub mod engine;
pub mod manager;
pub mod pool;
pub mod schema;

pub use connection::Conn;
pub use engine::{EngineTuning, GraphEngine, KuzuConnection, QueryOutcome, QueryRow, ScalarValue};
pub use manager::{
    CapacitySnapshot, CreateDatabaseRequest, CreateDatabaseResponse, DatabaseInfo, DatabaseState,
    GraphDatabaseManager, GraphMetadataSink, NullMetadataSink,
};
pub use pool::{CheckpointOverrides, GraphConnectionPool, PooledConnection, PoolStats};
pub use schema::SchemaCatalog;
