use lyra_types::FileId;
use lyra_version::VersionError;

/// Errors produced by merge operations.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("version {number} not found for file {file}")]
    VersionNotFound { file: FileId, number: u64 },

    #[error("content of version {number} of file {file} is missing")]
    ContentMissing { file: FileId, number: u64 },

    /// A conflicted outcome cannot be committed as a version.
    #[error("merge has unresolved conflicts")]
    Unresolved,

    #[error("version error: {0}")]
    Version(#[from] VersionError),
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;
