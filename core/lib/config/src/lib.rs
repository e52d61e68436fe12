//! Typed configuration loaded from environment variables, the way
//! `zksync_config` loads `ZkSyncConfig` for the teacher's server binary.

pub mod configs;

pub use configs::{GraphStoreConfig, NodeConfig, ObjectStoreConfig, StagingStoreConfig};

/// Aggregates every sub-config the engine needs at startup, the way
/// `ZkSyncConfig` aggregates `DBConfig`/`ETHClientConfig`/etc.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub node: NodeConfig,
    pub graph_store: GraphStoreConfig,
    pub staging_store: StagingStoreConfig,
    pub object_store: ObjectStoreConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            node: NodeConfig::from_env(),
            graph_store: GraphStoreConfig::from_env(),
            staging_store: StagingStoreConfig::from_env(),
            object_store: ObjectStoreConfig::from_env(),
        }
    }
}

/// Convenience macro that loads a config struct from prefixed environment
/// variables, panicking with the struct's name if loading fails. Lifted
/// verbatim from `core/lib/config`'s `envy_load!`.
///
/// # Panics
///
/// Panics if the config cannot be loaded from the environment variables.
#[macro_export]
macro_rules! envy_load {
    ($name:expr, $prefix:expr) => {
        envy::prefixed($prefix)
            .from_env()
            .unwrap_or_else(|err| panic!("Cannot load config <{}>: {}", $name, err))
    };
}
