use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use lyra_diff::{DiffResult, HistoryEntry, VersionDiffer};
use lyra_merge::{MergeOutcome, VersionMerger};
use lyra_retention::{
    BatchCleanupReport, CleanupEngine, CleanupReport, CleanupScheduler, SchedulerHandle,
    SweepReport,
};
use lyra_store::{BlobStore, FsBlobStore, InMemoryBlobStore};
use lyra_types::FileId;
use lyra_version::{
    FileCatalog, FileDescriptor, FileLocks, InMemoryFileCatalog, InMemoryVersionRecords,
    JsonFileCatalog, JsonVersionRecords, RollbackMode, Version, VersionManager, VersionOrder,
    VersionPage, VersionRecordStore, VersionResult, VersionStatistics,
};
use tracing::info;

use crate::config::VaultConfig;
use crate::error::{SdkError, SdkResult};

enum Catalog {
    Memory(Arc<InMemoryFileCatalog>),
    Json(Arc<JsonFileCatalog>),
}

impl Catalog {
    fn shared(&self) -> Arc<dyn FileCatalog> {
        match self {
            Self::Memory(c) => c.clone(),
            Self::Json(c) => c.clone(),
        }
    }

    fn register(&self, file: FileId, descriptor: FileDescriptor) -> VersionResult<()> {
        match self {
            Self::Memory(c) => {
                c.register(file, descriptor);
                Ok(())
            }
            Self::Json(c) => c.register(file, descriptor),
        }
    }

    fn remove_file(&self, file: FileId) -> VersionResult<bool> {
        match self {
            Self::Memory(c) => Ok(c.remove_file(file)),
            Self::Json(c) => c.remove_file(file),
        }
    }

    fn files(&self) -> Vec<FileId> {
        match self {
            Self::Memory(c) => c.files(),
            Self::Json(c) => c.files(),
        }
    }
}

/// High-level Lyra Vault API.
///
/// Wires a blob store, version records and a file catalog from a
/// [`VaultConfig`] and exposes versioning, retention, diff and merge over
/// them.
pub struct Vault {
    config: VaultConfig,
    fs_store: Option<Arc<FsBlobStore>>,
    catalog: Catalog,
    versions: Arc<VersionManager>,
    engine: Arc<CleanupEngine>,
    differ: VersionDiffer,
    merger: VersionMerger,
}

impl Vault {
    pub fn open(config: VaultConfig) -> SdkResult<Self> {
        config.validate()?;

        let fs_store = if config.in_memory {
            None
        } else {
            Some(Arc::new(FsBlobStore::open(config.store.clone())?))
        };
        let blobs: Arc<dyn BlobStore> = match &fs_store {
            Some(store) => store.clone(),
            None => Arc::new(InMemoryBlobStore::new()),
        };

        let records: Arc<dyn VersionRecordStore> = match &config.records_path {
            Some(path) => {
                ensure_parent(path)?;
                Arc::new(JsonVersionRecords::open(path)?)
            }
            None => Arc::new(InMemoryVersionRecords::new()),
        };

        let catalog = match &config.catalog_path {
            Some(path) => {
                ensure_parent(path)?;
                Catalog::Json(Arc::new(JsonFileCatalog::open(path)?))
            }
            None => Catalog::Memory(Arc::new(InMemoryFileCatalog::new())),
        };

        let versions = Arc::new(VersionManager::new(
            blobs,
            records,
            catalog.shared(),
            Arc::new(FileLocks::new()),
        ));
        info!(in_memory = config.in_memory, "vault opened");

        Ok(Self {
            engine: Arc::new(CleanupEngine::new(versions.clone())),
            differ: VersionDiffer::new(versions.clone()).with_config(config.diff.clone()),
            merger: VersionMerger::new(versions.clone()),
            config,
            fs_store,
            catalog,
            versions,
        })
    }

    pub fn in_memory() -> SdkResult<Self> {
        Self::open(VaultConfig::in_memory())
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn versions(&self) -> &Arc<VersionManager> {
        &self.versions
    }

    pub fn cleanup_engine(&self) -> &Arc<CleanupEngine> {
        &self.engine
    }

    pub fn differ(&self) -> &VersionDiffer {
        &self.differ
    }

    pub fn merger(&self) -> &VersionMerger {
        &self.merger
    }

    // ---- Files ----

    pub fn track(&self, file: FileId, descriptor: FileDescriptor) -> SdkResult<()> {
        self.catalog.register(file, descriptor)?;
        Ok(())
    }

    /// Forget a file. Its versions are purged by the next [`Vault::sweep`].
    pub fn untrack(&self, file: FileId) -> SdkResult<bool> {
        Ok(self.catalog.remove_file(file)?)
    }

    pub fn files(&self) -> Vec<FileId> {
        self.catalog.files()
    }

    // ---- Versions ----

    pub fn put(
        &self,
        file: FileId,
        data: &[u8],
        comment: Option<&str>,
        creator: &str,
    ) -> SdkResult<Version> {
        Ok(self
            .versions
            .create_version_from_bytes(file, data, comment, creator)?)
    }

    /// Stream a file from disk into a new version.
    pub fn put_file(
        &self,
        file: FileId,
        path: impl AsRef<Path>,
        comment: Option<&str>,
        creator: &str,
    ) -> SdkResult<Version> {
        let mut reader = File::open(path)?;
        Ok(self
            .versions
            .create_version(file, &mut reader, comment, creator)?)
    }

    /// Versions of `file`, newest first.
    pub fn history(&self, file: FileId) -> SdkResult<Vec<Version>> {
        Ok(self.versions.list_versions(file, VersionOrder::Descending)?)
    }

    pub fn content(&self, file: FileId, number: u64) -> SdkResult<Vec<u8>> {
        self.versions
            .read_content_by_number(file, number)?
            .ok_or(SdkError::VersionNotFound { file, number })
    }

    /// Content of the latest version.
    pub fn latest_content(&self, file: FileId) -> SdkResult<Vec<u8>> {
        let latest = self
            .versions
            .get_latest(file)?
            .ok_or(SdkError::NoVersions(file))?;
        self.content(file, latest.number)
    }

    pub fn delete_version(&self, file: FileId, number: u64) -> SdkResult<bool> {
        Ok(self.versions.delete_version_by_number(file, number)?)
    }

    pub fn rollback(
        &self,
        file: FileId,
        target: u64,
        mode: RollbackMode,
        operator: &str,
    ) -> SdkResult<Version> {
        Ok(self.versions.rollback(file, target, mode, operator)?)
    }

    pub fn next_version_number(&self, file: FileId) -> SdkResult<u64> {
        Ok(self.versions.next_version_number(file)?)
    }

    /// One page of `file`'s versions, newest first.
    pub fn history_page(
        &self,
        file: FileId,
        page: usize,
        per_page: usize,
    ) -> SdkResult<VersionPage> {
        Ok(self
            .versions
            .versions_paged(file, page, per_page, VersionOrder::Descending)?)
    }

    pub fn commented_versions(&self, file: FileId) -> SdkResult<Vec<Version>> {
        Ok(self.versions.versions_with_comment(file)?)
    }

    pub fn uncommented_versions(&self, file: FileId) -> SdkResult<Vec<Version>> {
        Ok(self.versions.versions_without_comment(file)?)
    }

    /// Versions larger than `threshold` bytes, newest first.
    pub fn large_versions(&self, file: FileId, threshold: u64) -> SdkResult<Vec<Version>> {
        Ok(self.versions.large_versions(file, threshold)?)
    }

    /// Versions whose content matches `pattern`, newest first.
    pub fn search_content(
        &self,
        file: FileId,
        pattern: &str,
        is_regex: bool,
    ) -> SdkResult<Vec<Version>> {
        Ok(self.versions.search_by_content(file, pattern, is_regex)?)
    }

    pub fn statistics(&self, file: FileId) -> SdkResult<VersionStatistics> {
        Ok(self.versions.statistics(file)?)
    }

    /// Integrity of every version of `file`, keyed by version number.
    pub fn verify(&self, file: FileId) -> SdkResult<BTreeMap<u64, bool>> {
        let versions = self.versions.list_versions(file, VersionOrder::Ascending)?;
        let mut results = BTreeMap::new();
        for version in versions {
            results.insert(version.number, self.versions.verify_integrity(&version.id)?);
        }
        Ok(results)
    }

    // ---- Diff and merge ----

    pub fn diff(&self, file: FileId, from: u64, to: u64) -> SdkResult<DiffResult> {
        Ok(self.differ.compare_versions(file, from, to)?)
    }

    /// Per-version change entries, newest first.
    pub fn change_history(
        &self,
        file: FileId,
        limit: Option<usize>,
    ) -> SdkResult<Vec<HistoryEntry>> {
        Ok(self.differ.history(file, limit)?)
    }

    pub fn merge(&self, file: FileId, base: u64, a: u64, b: u64) -> SdkResult<MergeOutcome> {
        Ok(self.merger.merge_versions(file, base, a, b)?)
    }

    pub fn commit_merge(
        &self,
        file: FileId,
        outcome: &MergeOutcome,
        comment: Option<&str>,
        creator: &str,
    ) -> SdkResult<Version> {
        Ok(self.merger.commit_merge(file, outcome, comment, creator)?)
    }

    // ---- Retention ----

    /// Apply the configured retention policy to one file.
    pub fn cleanup(&self, file: FileId) -> SdkResult<CleanupReport> {
        Ok(self.engine.cleanup(file, &self.config.retention)?)
    }

    /// Apply the configured retention policy to every file with versions.
    pub fn cleanup_all(&self) -> SdkResult<BatchCleanupReport> {
        Ok(self.engine.cleanup_all(&self.config.retention)?)
    }

    /// Drop versions whose content repeats in a newer version of `file`.
    pub fn optimize_storage(&self, file: FileId) -> SdkResult<CleanupReport> {
        Ok(self.engine.optimize_storage(file)?)
    }

    pub fn sweep(&self) -> SdkResult<SweepReport> {
        Ok(self.engine.sweep_orphans()?)
    }

    /// Remove abandoned staging files. Always 0 for an in-memory vault.
    pub fn cleanup_staging(&self) -> SdkResult<usize> {
        match &self.fs_store {
            Some(store) => Ok(store.cleanup_staging()?),
            None => Ok(0),
        }
    }

    /// Start periodic cleanup with the configured policy and interval.
    /// Must be called within a tokio runtime.
    pub fn schedule_cleanup(&self) -> SdkResult<SchedulerHandle> {
        let scheduler = CleanupScheduler::new(
            self.engine.clone(),
            self.config.retention.clone(),
            self.config.cleanup_interval,
        )?;
        Ok(scheduler.spawn())
    }
}

fn ensure_parent(path: &Path) -> SdkResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
