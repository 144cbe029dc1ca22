//! Error types for the diff crate.

use lyra_types::FileId;
use lyra_version::VersionError;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A version referenced by number does not exist.
    #[error("version {number} not found for file {file}")]
    VersionNotFound { file: FileId, number: u64 },

    /// The version exists but its content could not be read back.
    #[error("content of version {number} of file {file} is missing")]
    ContentMissing { file: FileId, number: u64 },

    /// Version manager operation failed.
    #[error("version error: {0}")]
    Version(#[from] VersionError),
}

/// Convenience alias for diff operations.
pub type Result<T, E = DiffError> = std::result::Result<T, E>;
