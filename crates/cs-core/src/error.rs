/// Errors shared across the engine's boundary types.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("value out of range converting to dense id: {0}")]
    IdOutOfRange(u64),
}

impl CoreError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
