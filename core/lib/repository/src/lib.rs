//! Uniform repository facade over a local embedded graph engine or a
//! remote graph-API client, plus the streaming-chunk adapter shared by
//! both (spec §4.9).

pub mod facade;
pub mod local;
pub mod remote;
pub mod stream;

pub use facade::Repository;
pub use local::LocalRepository;
pub use remote::{RemoteClient, RemoteRepository};
pub use stream::{passthrough_chunk, slice_into_chunks, RepoStreamChunk};
