//! Connection pool over the persisted credit ledger, grounded on
//! `core/lib/storage/src/connection/mod.rs`: the same `deadpool` wrapper
//! around `sqlx::PgConnection`, the same `DATABASE_URL`/pool-size
//! environment contract, generalized from one fixed schema to any table
//! this crate's [`crate::schema::CreditSchema`] touches.

use std::fmt;

use async_trait::async_trait;
use deadpool::managed::{Manager, PoolConfig, RecycleResult, Timeouts};
use sqlx::{Connection, Error as SqlxError, PgConnection};

type Pool = deadpool::managed::Pool<PgConnection, SqlxError>;
pub type PooledConnection = deadpool::managed::Object<PgConnection, SqlxError>;

#[derive(Clone)]
struct DbPool {
    url: String,
}

impl DbPool {
    fn create(url: impl Into<String>, max_size: usize) -> Pool {
        let pool_config = PoolConfig {
            max_size,
            timeouts: Timeouts::wait_millis(20_000),
        };
        Pool::from_config(DbPool { url: url.into() }, pool_config)
    }
}

#[async_trait]
impl Manager<PgConnection, SqlxError> for DbPool {
    async fn create(&self) -> Result<PgConnection, SqlxError> {
        PgConnection::connect(&self.url).await
    }

    async fn recycle(&self, obj: &mut PgConnection) -> RecycleResult<SqlxError> {
        Ok(obj.ping().await?)
    }
}

/// Wraps a fixed-size pool of connections to the credits ledger database.
#[derive(Clone)]
pub struct CreditsConnectionPool {
    pool: Pool,
}

impl fmt::Debug for CreditsConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CreditsConnectionPool")
    }
}

impl CreditsConnectionPool {
    pub fn new(database_url: impl Into<String>, max_size: u32) -> Self {
        Self {
            pool: DbPool::create(database_url.into(), max_size as usize),
        }
    }

    /// Acquires a pooled connection. Recycle failures (a dropped
    /// connection, a database restart) surface as [`SqlxError`]; callers
    /// map that into the crate's [`graphnode_basic_types::Error`] at the
    /// schema boundary.
    pub async fn access(&self) -> Result<PooledConnection, SqlxError> {
        self.pool.get().await.map_err(|e| match e {
            deadpool::managed::PoolError::Backend(e) => e,
            other => SqlxError::Io(std::io::Error::other(other.to_string())),
        })
    }
}
