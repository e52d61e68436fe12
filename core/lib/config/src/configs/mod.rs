// Public re-exports
pub use self::{
    node::NodeConfig, object_store::ObjectStoreConfig, staging_store::StagingStoreConfig,
    graph_store::GraphStoreConfig,
};

pub mod graph_store;
pub mod node;
pub mod object_store;
pub mod staging_store;

#[cfg(test)]
pub(crate) mod test_utils;
