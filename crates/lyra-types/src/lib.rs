//! Foundation types for Lyra Vault.
//!
//! This crate provides the identifier types shared by every other Lyra
//! crate: the content hash that names a blob, the location a blob lives at,
//! and the identifiers of logical files and their versions.
//!
//! # Key Types
//!
//! - [`ContentHash`]: SHA-256 digest of a blob's full byte stream
//! - [`BlobLocation`]: Relative storage path derived from a content hash
//! - [`FileId`]: Identity of a logical file, owned by the file-record layer
//! - [`VersionId`]: UUID v7 identifier of an immutable version record

pub mod error;
pub mod hash;
pub mod ids;
pub mod location;

pub use error::TypeError;
pub use hash::ContentHash;
pub use ids::{FileId, VersionId};
pub use location::BlobLocation;
