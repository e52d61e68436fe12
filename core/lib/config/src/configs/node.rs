// External uses
use serde::Deserialize;
// Local uses
use crate::envy_load;

/// Node-wide capacity knobs (spec §6: `ENVIRONMENT`, `MAX_MEMORY_MB`,
/// `MAX_DATABASES_PER_NODE`, `DATABASES_PER_INSTANCE`).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NodeConfig {
    /// `dev` / `staging` / `prod`.
    pub environment: String,
    pub max_memory_mb: u64,
    pub max_databases_per_node: u32,
    /// Tier override; when unset, callers fall back to `max_databases_per_node`.
    pub databases_per_instance: Option<u32>,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        envy_load!("node", "NODE_")
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
NODE_ENVIRONMENT="prod"
NODE_MAX_MEMORY_MB="8192"
NODE_MAX_DATABASES_PER_NODE="50"
NODE_DATABASES_PER_INSTANCE="10"
        "#,
        );

        let config = NodeConfig::from_env();
        assert_eq!(config.environment, "prod");
        assert_eq!(config.max_databases_per_node, 50);
        assert_eq!(config.databases_per_instance, Some(10));
    }
}
