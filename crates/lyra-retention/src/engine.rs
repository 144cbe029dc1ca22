use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lyra_types::FileId;
use lyra_version::{Version, VersionManager, VersionOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RetentionResult;
use crate::policy::RetentionPolicy;

/// Outcome of applying a policy to one file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub versions_examined: u64,
    pub versions_deleted: u64,
    /// Numbers of the deleted versions, newest first.
    pub deleted_numbers: Vec<u64>,
    /// Bytes of blobs physically removed. Content still shared with a
    /// surviving version is not counted.
    pub bytes_freed: u64,
    pub errors: Vec<String>,
}

impl CleanupReport {
    /// Fraction of examined versions that were deleted.
    pub fn cleanup_ratio(&self) -> f64 {
        if self.versions_examined == 0 {
            0.0
        } else {
            self.versions_deleted as f64 / self.versions_examined as f64
        }
    }

    pub fn is_successful(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Per-file reports from a multi-file cleanup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCleanupReport {
    pub reports: BTreeMap<FileId, CleanupReport>,
    /// Files whose cleanup could not start, with the reason.
    pub failures: BTreeMap<FileId, String>,
}

impl BatchCleanupReport {
    pub fn versions_deleted(&self) -> u64 {
        self.reports.values().map(|r| r.versions_deleted).sum()
    }

    pub fn bytes_freed(&self) -> u64 {
        self.reports.values().map(|r| r.bytes_freed).sum()
    }

    pub fn is_successful(&self) -> bool {
        self.failures.is_empty() && self.reports.values().all(CleanupReport::is_successful)
    }
}

/// Outcome of an orphan sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Version records removed because their file no longer exists.
    pub orphaned_versions: u64,
    /// Stored blobs removed because no version references them.
    pub orphaned_blobs: u64,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
}

impl SweepReport {
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Applies retention policies and reclaims unreferenced content.
pub struct CleanupEngine {
    versions: Arc<VersionManager>,
}

impl CleanupEngine {
    pub fn new(versions: Arc<VersionManager>) -> Self {
        Self { versions }
    }

    pub fn versions(&self) -> &Arc<VersionManager> {
        &self.versions
    }

    pub fn cleanup(&self, file: FileId, policy: &RetentionPolicy) -> RetentionResult<CleanupReport> {
        self.cleanup_at(file, policy, Utc::now())
    }

    /// Apply `policy` to `file` as if the current time were `now`.
    ///
    /// Every selected version goes through the manager's delete, which
    /// re-checks the last-version rule, and then through blob reclamation.
    /// Failures on single versions are recorded in the report.
    pub fn cleanup_at(
        &self,
        file: FileId,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> RetentionResult<CleanupReport> {
        policy.validate()?;
        let versions = self.versions.list_versions(file, VersionOrder::Ascending)?;
        let mut report = CleanupReport {
            versions_examined: versions.len() as u64,
            ..Default::default()
        };

        self.remove_versions(file, &policy.select(&versions, now), &mut report);

        info!(
            %file,
            examined = report.versions_examined,
            deleted = report.versions_deleted,
            bytes_freed = report.bytes_freed,
            errors = report.errors.len(),
            "cleanup finished"
        );
        Ok(report)
    }

    /// Delete versions whose content duplicates a newer version of the same
    /// file. The newest version of each content is kept.
    pub fn optimize_storage(&self, file: FileId) -> RetentionResult<CleanupReport> {
        let mut report = CleanupReport {
            versions_examined: self.versions.count_versions(file)?,
            ..Default::default()
        };
        let mut redundant: Vec<Version> = self
            .versions
            .duplicate_versions(file)?
            .into_values()
            .flat_map(|mut group| {
                group.pop();
                group
            })
            .collect();
        redundant.sort_by(|a, b| b.number.cmp(&a.number));
        self.remove_versions(file, &redundant, &mut report);

        info!(
            %file,
            examined = report.versions_examined,
            deleted = report.versions_deleted,
            "duplicate versions removed"
        );
        Ok(report)
    }

    pub fn batch_cleanup(&self, files: &[FileId], policy: &RetentionPolicy) -> BatchCleanupReport {
        self.batch_cleanup_at(files, policy, Utc::now())
    }

    pub fn batch_cleanup_at(
        &self,
        files: &[FileId],
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> BatchCleanupReport {
        let mut batch = BatchCleanupReport::default();
        for file in files {
            match self.cleanup_at(*file, policy, now) {
                Ok(report) => {
                    batch.reports.insert(*file, report);
                }
                Err(e) => {
                    warn!(%file, error = %e, "cleanup could not run");
                    batch.failures.insert(*file, e.to_string());
                }
            }
        }
        batch
    }

    /// Apply `policy` to every file that has version records.
    pub fn cleanup_all(&self, policy: &RetentionPolicy) -> RetentionResult<BatchCleanupReport> {
        policy.validate()?;
        let files = self.versions.records().files()?;
        let batch = self.batch_cleanup(&files, policy);
        info!(
            files = files.len(),
            deleted = batch.versions_deleted(),
            bytes_freed = batch.bytes_freed(),
            "cleanup of all files finished"
        );
        Ok(batch)
    }

    /// Remove records of deleted files, then every blob nothing references.
    pub fn sweep_orphans(&self) -> RetentionResult<SweepReport> {
        let mut report = SweepReport::default();
        let catalog = self.versions.catalog();

        for file in self.versions.records().files()? {
            if catalog.file_exists(file) {
                continue;
            }
            match self.versions.purge_orphaned_file(file) {
                Ok(removed) => report.orphaned_versions += removed.len() as u64,
                Err(e) => {
                    warn!(%file, error = %e, "failed to purge orphaned versions");
                    report
                        .errors
                        .push(format!("failed to purge versions of file {file}: {e}"));
                }
            }
        }

        match self.versions.reclaim_unreferenced() {
            Ok(removed) => {
                report.orphaned_blobs = removed.len() as u64;
                report.bytes_freed = removed.iter().map(|(_, size)| size).sum();
            }
            Err(e) => {
                warn!(error = %e, "failed to reclaim unreferenced blobs");
                report
                    .errors
                    .push(format!("failed to reclaim unreferenced blobs: {e}"));
            }
        }

        info!(
            orphaned_versions = report.orphaned_versions,
            orphaned_blobs = report.orphaned_blobs,
            bytes_freed = report.bytes_freed,
            "orphan sweep finished"
        );
        Ok(report)
    }

    /// Delete `candidates` newest first, keeping the rule that a file always
    /// retains one version, and reclaim their blobs.
    fn remove_versions<'a>(
        &self,
        file: FileId,
        candidates: impl IntoIterator<Item = &'a Version>,
        report: &mut CleanupReport,
    ) {
        for version in candidates {
            match self.versions.delete_version(&version.id) {
                Ok(true) => {
                    report.versions_deleted += 1;
                    report.deleted_numbers.push(version.number);
                }
                Ok(false) => {
                    debug!(%file, number = version.number, "version kept by delete check");
                    continue;
                }
                Err(e) => {
                    warn!(%file, number = version.number, error = %e, "failed to delete version");
                    report
                        .errors
                        .push(format!("failed to delete version {}: {e}", version.number));
                    continue;
                }
            }

            match self.versions.reclaim_blob(&version.hash, &version.location) {
                Ok(Some(bytes)) => report.bytes_freed += bytes,
                Ok(None) => {}
                Err(e) => {
                    warn!(%file, number = version.number, error = %e, "failed to reclaim blob");
                    report.errors.push(format!(
                        "failed to reclaim content of version {}: {e}",
                        version.number
                    ));
                }
            }
        }
    }
}
