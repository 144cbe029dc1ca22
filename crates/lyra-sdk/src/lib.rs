//! High-level SDK for Lyra Vault.
//!
//! [`Vault`] is the main entry point for applications embedding Lyra: it
//! builds the storage, version, retention, diff and merge layers from a
//! [`VaultConfig`] and exposes them behind one API.

pub mod config;
pub mod error;
pub mod vault;

pub use config::VaultConfig;
pub use error::{SdkError, SdkResult};
pub use vault::Vault;

pub use lyra_diff::{
    ChangeType, DiffConfig, DiffKind, DiffOp, DiffResult, DiffStats, HistoryEntry,
};
pub use lyra_merge::MergeOutcome;
pub use lyra_retention::{
    BatchCleanupReport, CleanupReport, RetentionPolicy, RetentionStrategy, SchedulerHandle,
    SweepReport,
};
pub use lyra_store::StoreConfig;
pub use lyra_types::{ContentHash, FileId, VersionId};
pub use lyra_version::{FileDescriptor, RollbackMode, Version, VersionPage, VersionStatistics};
