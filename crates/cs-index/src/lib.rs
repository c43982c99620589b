pub mod builder;
pub mod chunk;
pub mod chunkfile;
pub mod corpus;
pub mod dedup;
pub mod error;
pub mod format;
pub mod scan;
pub mod store;
pub mod suffix;

pub use builder::{CorpusBuilder, IndexOutcome};
pub use chunk::{Chunk, ChunkBuilder};
pub use chunkfile::{ChunkFileRecord, ChunkFileTree};
pub use corpus::Corpus;
pub use error::IndexError;
