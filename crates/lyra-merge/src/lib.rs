//! Merge engine for Lyra Vault.
//!
//! Implements whole-content three-way merge with conflict markers, and
//! merging of stored versions with an optional commit of clean results.

pub mod error;
pub mod merge;
pub mod merger;

pub use error::{MergeError, MergeResult};
pub use merge::{three_way_merge, MergeOutcome, MARKER_OURS, MARKER_SEPARATOR, MARKER_THEIRS};
pub use merger::VersionMerger;
