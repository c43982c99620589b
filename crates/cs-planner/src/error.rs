/// Errors surfaced while turning a query's regex into a plan.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("regex parse error: {0}")]
    RegexParse(#[from] regex_syntax::Error),

    #[error("parsed pattern is too large ({nodes} hir nodes, max {max})")]
    ProgramTooLarge { nodes: usize, max: usize },
}

impl PlannerError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
