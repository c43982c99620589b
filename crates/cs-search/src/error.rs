/// Errors surfaced at the query boundary. Per-chunk degrade-silently paths
/// (over-long candidate set, predicate-density bail-out) are not modeled
/// here — they fall back to a different search strategy, never an `Err`.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SearchError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<cs_planner::PlannerError> for SearchError {
    fn from(e: cs_planner::PlannerError) -> Self {
        SearchError::InvalidArgument(e.to_string())
    }
}

impl From<regex::Error> for SearchError {
    fn from(e: regex::Error) -> Self {
        SearchError::InvalidArgument(e.to_string())
    }
}
