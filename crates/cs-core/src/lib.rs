pub mod config;
pub mod error;
pub mod ids;
pub mod model;
pub mod query;
pub mod util;

pub use config::Config;
pub use ids::{ChunkId, FileId, RepoId, TreeId};
pub use query::{ExitReason, LineRef, MatchContext, MatchResult, PatternFilter, Query, SearchStats};
