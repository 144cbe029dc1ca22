use std::sync::Arc;

use lyra_types::FileId;
use lyra_version::{Version, VersionManager, VersionOrder};
use tracing::debug;

use crate::binary::diff_binary_as;
use crate::classify::{classify, sniff, DiffKind};
use crate::error::{DiffError, Result};
use crate::result::{DiffResult, DiffStats};
use crate::config::DiffConfig;
use crate::history::{ChangeType, HistoryEntry};
use crate::text::diff_text_with_config;

/// Compares stored versions of a file. Never mutates stored state.
pub struct VersionDiffer {
    versions: Arc<VersionManager>,
    config: DiffConfig,
}

impl VersionDiffer {
    pub fn new(versions: Arc<VersionManager>) -> Self {
        Self {
            versions,
            config: DiffConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DiffConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `context` lines around each change in unified output.
    pub fn with_context(mut self, context: usize) -> Self {
        self.config.context_lines = context;
        self
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Diff version `from` against version `to` of `file`.
    pub fn compare_versions(&self, file: FileId, from: u64, to: u64) -> Result<DiffResult> {
        let old_version = self.load_version(file, from)?;
        let new_version = self.load_version(file, to)?;
        let old = self.load_content(&old_version)?;
        let new = self.load_content(&new_version)?;

        let descriptor = self.versions.describe(file);
        let kind = match &descriptor {
            Some(d) => classify(&d.name, d.mime_type.as_deref()),
            None if sniff(&old) == DiffKind::Text && sniff(&new) == DiffKind::Text => DiffKind::Text,
            None => DiffKind::Binary,
        };
        debug!(%file, from, to, ?kind, "comparing versions");

        let result = match kind {
            DiffKind::Text => {
                let name = descriptor
                    .map(|d| d.name)
                    .unwrap_or_else(|| format!("file-{file}"));
                diff_text_with_config(
                    &String::from_utf8_lossy(&old),
                    &String::from_utf8_lossy(&new),
                    &name,
                    &self.config,
                )
            }
            DiffKind::Binary | DiffKind::Unsupported => diff_binary_as(&old, &new, kind),
        };
        Ok(result)
    }

    /// Diff version `number` against the latest version.
    pub fn compare_with_latest(&self, file: FileId, number: u64) -> Result<DiffResult> {
        let latest = self
            .versions
            .get_latest(file)?
            .ok_or(DiffError::VersionNotFound { file, number })?;
        self.compare_versions(file, number, latest.number)
    }

    /// Whether versions `a` and `b` differ at all.
    pub fn detect_conflicts(&self, file: FileId, a: u64, b: u64) -> Result<bool> {
        Ok(self.compare_versions(file, a, b)?.has_changes())
    }

    pub fn diff_statistics(&self, file: FileId, from: u64, to: u64) -> Result<DiffStats> {
        Ok(self.compare_versions(file, from, to)?.stats())
    }

    /// Change history of `file`, newest first, each version compared with
    /// the one before it. `limit` caps the number of entries.
    pub fn history(&self, file: FileId, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let all = self.versions.list_versions(file, VersionOrder::Ascending)?;
        let skip = limit.map_or(0, |l| all.len().saturating_sub(l));
        let mut entries = Vec::with_capacity(all.len() - skip);
        for (i, version) in all.iter().enumerate().skip(skip) {
            let entry = match i.checked_sub(1).map(|p| &all[p]) {
                None => HistoryEntry::created(version),
                Some(previous) => {
                    let diff = self.compare_versions(file, previous.number, version.number)?;
                    HistoryEntry {
                        change_type: ChangeType::between(previous, version),
                        summary: HistoryEntry::describe(version, previous),
                        size_change: version.size as i64 - previous.size as i64,
                        similarity: diff.similarity,
                        version: version.clone(),
                    }
                }
            };
            entries.push(entry);
        }
        entries.reverse();
        debug!(%file, entries = entries.len(), "built change history");
        Ok(entries)
    }

    pub(crate) fn load_version(&self, file: FileId, number: u64) -> Result<Version> {
        self.versions
            .get_version(file, number)?
            .ok_or(DiffError::VersionNotFound { file, number })
    }

    pub(crate) fn load_content(&self, version: &Version) -> Result<Vec<u8>> {
        self.versions
            .read_content(version)?
            .ok_or(DiffError::ContentMissing {
                file: version.file_id,
                number: version.number,
            })
    }
}
