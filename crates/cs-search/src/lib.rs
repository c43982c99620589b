pub mod driver;
pub mod error;
pub mod filtered;
pub mod fullscan;
pub mod resolve;

pub use driver::{SearchDriver, SearchOutcome};
pub use error::SearchError;
