//! Attach-and-copy pipeline moving staging rows into a graph database
//! (spec §4.6).

pub mod checkpoint;
pub mod pipeline;
pub mod registry;

pub use checkpoint::checkpoint_staging;
pub use pipeline::{
    IngestOptions, IngestOutcome, IngestionPipeline, MaterializeOptions,
};
pub use registry::{
    FileRegistry, GraphSchemaRegistry, NullFileRegistry, NullRebuildMetadataSink,
    NullSchemaRegistry, RebuildMetadataSink,
};
