use lyra_types::{BlobLocation, TypeError};

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob was not found.
    #[error("blob not found: {0}")]
    NotFound(BlobLocation),

    /// I/O error from the underlying storage backend.
    ///
    /// Staging and promote failures surface here. Nothing partial is left
    /// visible, so the operation can be retried.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A caller-supplied location failed validation.
    #[error("invalid location: {0}")]
    InvalidLocation(#[from] TypeError),

    /// The incoming stream exceeded the configured size limit.
    #[error("blob exceeds size limit of {limit} bytes")]
    TooLarge { limit: u64 },
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
