use lyra_version::VersionError;

/// Errors produced by retention operations.
///
/// Failures on individual versions during a cleanup run are collected in the
/// run's report; these errors abort a run as a whole.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    #[error("invalid retention policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Result alias for retention operations.
pub type RetentionResult<T> = Result<T, RetentionError>;
