use lyra_types::FileId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("version {number} of file {file} not found")]
    VersionNotFound { file: FileId, number: u64 },

    #[error("file {0} has no versions")]
    NoVersions(FileId),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] lyra_store::StoreError),

    #[error("version error: {0}")]
    Version(#[from] lyra_version::VersionError),

    #[error("retention error: {0}")]
    Retention(#[from] lyra_retention::RetentionError),

    #[error("diff error: {0}")]
    Diff(#[from] lyra_diff::DiffError),

    #[error("merge error: {0}")]
    Merge(#[from] lyra_merge::MergeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SdkError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
