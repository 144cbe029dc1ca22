use std::sync::Arc;

use lyra_types::FileId;
use lyra_version::{Version, VersionManager};
use tracing::info;

use crate::error::{MergeError, MergeResult};
use crate::merge::{three_way_merge, MergeOutcome};

/// Merges stored versions of a file.
pub struct VersionMerger {
    versions: Arc<VersionManager>,
}

impl VersionMerger {
    pub fn new(versions: Arc<VersionManager>) -> Self {
        Self { versions }
    }

    /// Three-way merge of versions `a` and `b` against their common `base`.
    ///
    /// Contents are read as UTF-8, with invalid sequences replaced.
    pub fn merge_versions(&self, file: FileId, base: u64, a: u64, b: u64) -> MergeResult<MergeOutcome> {
        let base_text = self.load_text(file, base)?;
        let a_text = self.load_text(file, a)?;
        let b_text = self.load_text(file, b)?;
        let outcome = three_way_merge(&base_text, &a_text, &b_text);
        info!(%file, base, a, b, clean = outcome.is_clean(), "versions merged");
        Ok(outcome)
    }

    /// Store a clean merge outcome as the file's next version.
    pub fn commit_merge(
        &self,
        file: FileId,
        outcome: &MergeOutcome,
        comment: Option<&str>,
        creator: &str,
    ) -> MergeResult<Version> {
        let MergeOutcome::Clean(content) = outcome else {
            return Err(MergeError::Unresolved);
        };
        let version = self.versions.create_version_from_bytes(
            file,
            content.as_bytes(),
            Some(comment.unwrap_or("Merge")),
            creator,
        )?;
        Ok(version)
    }

    fn load_text(&self, file: FileId, number: u64) -> MergeResult<String> {
        let version = self
            .versions
            .get_version(file, number)?
            .ok_or(MergeError::VersionNotFound { file, number })?;
        let bytes = self
            .versions
            .read_content(&version)?
            .ok_or(MergeError::ContentMissing { file, number })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
