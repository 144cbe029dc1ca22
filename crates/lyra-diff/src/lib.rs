//! Diff engine for Lyra Vault: content comparison between versions.
//!
//! # Modules
//!
//! - [`classify`]: decides whether content is compared as text or bytes
//! - [`text`]: line alignment, unified rendering and character similarity
//! - [`binary`]: position-wise byte similarity and change summaries
//! - [`differ`]: [`VersionDiffer`] over stored versions
//! - [`history`]: per-version change entries built on the differ

pub mod binary;
pub mod classify;
pub mod config;
pub mod differ;
pub mod error;
pub mod history;
pub mod result;
pub mod text;

pub use binary::{binary_similarity, change_summary, diff_binary};
pub use classify::{classify, sniff, DiffKind};
pub use config::DiffConfig;
pub use differ::VersionDiffer;
pub use error::{DiffError, Result};
pub use history::{ChangeType, HistoryEntry};
pub use result::{DiffLine, DiffOp, DiffResult, DiffStats};
pub use text::{
    diff_text, diff_text_with_config, diff_text_with_context, similarity, similarity_within,
};
