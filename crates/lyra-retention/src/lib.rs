//! Retention and cleanup for Lyra Vault.
//!
//! - [`RetentionPolicy`] decides which versions of a file are expendable
//! - [`CleanupEngine`] deletes them through the version manager and reclaims
//!   content no version references any more
//! - [`CleanupEngine::sweep_orphans`] removes records of deleted files and
//!   stray blobs
//! - [`CleanupScheduler`] repeats cleanup and sweep on an interval
//!
//! Cleanup only ever deletes version records via
//! [`lyra_version::VersionManager::delete_version`], so a file is never left
//! without a version.

pub mod engine;
pub mod error;
pub mod policy;
pub mod scheduler;

pub use engine::{BatchCleanupReport, CleanupEngine, CleanupReport, SweepReport};
pub use error::{RetentionError, RetentionResult};
pub use policy::{RetentionPolicy, RetentionStrategy};
pub use scheduler::{CleanupScheduler, MaintenanceReport, SchedulerHandle};
