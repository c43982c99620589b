/// Chunk-store / index build-and-load errors.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("malformed index: {reason}")]
    MalformedIndex { reason: String },

    #[error("chunk capacity exceeded: wanted {wanted}, capacity {capacity}")]
    ChunkCapacityExceeded { wanted: usize, capacity: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] bincode::Error),
}

impl IndexError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexError::Io(_))
    }
}
