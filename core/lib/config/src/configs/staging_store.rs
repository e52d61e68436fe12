// External uses
use serde::Deserialize;
// Local uses
use crate::envy_load;

/// Configuration for the staging connection pool and staging-database
/// manager (spec §6: `DUCKDB_STAGING_PATH`, `CONNECTION_POOL_SIZE`,
/// `CHUNK_SIZE`).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StagingStoreConfig {
    pub duckdb_staging_path: String,
    pub connection_pool_size: u32,
    pub chunk_size: usize,
    #[serde(default = "default_thread_count")]
    pub thread_count: u32,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
}

fn default_thread_count() -> u32 {
    4
}

fn default_memory_limit_mb() -> u64 {
    2048
}

impl StagingStoreConfig {
    pub fn from_env() -> Self {
        envy_load!("staging_store", "STAGING_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::test_utils::set_env;

    #[test]
    fn from_env() {
        set_env(
            r#"
STAGING_DUCKDB_STAGING_PATH="/var/lib/graphnode/staging"
STAGING_CONNECTION_POOL_SIZE="3"
STAGING_CHUNK_SIZE="1000"
        "#,
        );

        let config = StagingStoreConfig::from_env();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.thread_count, 4);
        assert_eq!(config.memory_limit_mb, 2048);
    }
}
