// External uses
use serde::Deserialize;
// Local uses
use crate::envy_load;

/// Configuration for the graph connection pool and the graph-database
/// manager (spec §6: `GRAPH_DATABASE_PATH`, `CONNECTION_POOL_SIZE`,
/// `QUERY_TIMEOUT`).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GraphStoreConfig {
    pub graph_database_path: String,
    pub connection_pool_size: u32,
    pub query_timeout_secs: u64,
    #[serde(default = "default_connection_ttl_minutes")]
    pub connection_ttl_minutes: u64,
    #[serde(default = "default_health_check_interval_minutes")]
    pub health_check_interval_minutes: u64,
    #[serde(default = "default_cleanup_interval_minutes")]
    pub cleanup_interval_minutes: u64,
}

fn default_connection_ttl_minutes() -> u64 {
    30
}

fn default_health_check_interval_minutes() -> u64 {
    5
}

fn default_cleanup_interval_minutes() -> u64 {
    10
}

impl GraphStoreConfig {
    pub fn from_env() -> Self {
        envy_load!("graph_store", "GRAPH_")
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
GRAPH_GRAPH_DATABASE_PATH="/var/lib/graphnode/graphs"
GRAPH_CONNECTION_POOL_SIZE="5"
GRAPH_QUERY_TIMEOUT_SECS="30"
        "#,
        );

        let config = GraphStoreConfig::from_env();
        assert_eq!(config.connection_pool_size, 5);
        assert_eq!(config.connection_ttl_minutes, 30);
    }
}
