//! Immutable version history for Lyra Vault.
//!
//! A version is a numbered, never-modified snapshot of a file's content.
//! This crate provides:
//! - [`Version`] records and the [`VersionRecordStore`] persistence boundary
//! - [`FileCatalog`], the callback boundary to whoever owns file identity
//! - In-memory and JSON-snapshot implementations of both
//! - [`FileLocks`] for per-file mutual exclusion
//! - [`VersionManager`]: creation, queries, deletion, rollback, integrity
//!   checks and reference-checked blob reclamation
//!
//! A file's version set never becomes empty once its first version exists.

pub mod catalog;
pub mod error;
pub mod locks;
pub mod manager;
pub mod persist;
pub mod records;
pub mod version;

pub use catalog::{CatalogEntry, FileCatalog, InMemoryFileCatalog};
pub use error::{VersionError, VersionResult};
pub use locks::FileLocks;
pub use manager::VersionManager;
pub use persist::{JsonFileCatalog, JsonVersionRecords};
pub use records::{InMemoryVersionRecords, VersionRecordStore};
pub use version::{
    format_size, CurrentContent, FileDescriptor, RollbackMode, Version, VersionOrder, VersionPage,
    VersionStatistics,
};
