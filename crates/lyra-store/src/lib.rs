//! Content-addressed blob storage for Lyra Vault.
//!
//! Every piece of file content is stored once, under a location derived from
//! the SHA-256 hash of its bytes. Writing content that already exists is a
//! successful no-op that returns the existing location; this is how
//! identical bytes are deduplicated across files and versions.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`FsBlobStore`]: directory tree with a private staging area and
//!   atomic no-clobber promotion
//! - [`InMemoryBlobStore`]: map-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written (content addressing guarantees this).
//! 2. Stage-then-promote: a half-written blob is never visible under its
//!    final name.
//! 3. Concurrent writers of identical content converge on one copy; an
//!    "already exists" outcome at promote time is success.
//! 4. The store never tracks references. Callers decide when a blob is dead.
//! 5. Integrity mismatches are reported, never repaired.

pub mod blob;
pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use blob::{BlobReader, PutHints, StoreStats, StoredBlob};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use memory::InMemoryBlobStore;
pub use traits::BlobStore;
