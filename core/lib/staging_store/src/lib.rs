//! Per-node manager and connection pool for embedded analytical staging
//! databases (spec §4.3, §4.5).

pub mod dedup;
pub mod engine;
pub mod manager;
pub mod pool;

pub use dedup::{classify, TableKind};
pub use engine::{
    DuckDbConnection, ObjectStoreCredentials, QueryOutcome, QueryRow, ScalarValue, StagingEngine,
    StagingTuning, StreamChunk,
};
pub use manager::{
    CreateTableRequest, CreateTableResponse, QueryTableResponse, StagingDatabaseManager,
    TableSource,
};
pub use pool::{PooledStagingConnection, StagingConnectionPool};
