use lyra_store::StoreError;
use lyra_types::{BlobLocation, FileId};

/// Errors produced by version operations.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("version {number} already exists for file {file}")]
    DuplicateVersion { file: FileId, number: u64 },

    #[error("version {number} not found for file {file}")]
    VersionNotFound { file: FileId, number: u64 },

    #[error("blob not found: {0}")]
    BlobNotFound(BlobLocation),

    #[error("file {0} has no earlier version to roll back to")]
    NothingToRollBack(FileId),

    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("record persistence error: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl VersionError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Persistence(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for VersionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for VersionError {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;
