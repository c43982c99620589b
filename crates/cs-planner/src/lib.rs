pub mod build;
pub mod error;
pub mod key;
pub mod lex;

pub use build::plan_query;
pub use error::PlannerError;
pub use key::{freeze, Anchor, FrozenKey, IndexKey, IndexKeyNode, Limits, Stats};

impl From<&cs_core::Config> for Limits {
    fn from(cfg: &cs_core::Config) -> Self {
        Limits {
            min_weight: cfg.min_weight,
            max_width: cfg.max_width,
            max_recursion: cfg.max_recursion,
            max_nodes: cfg.max_nodes,
        }
    }
}
