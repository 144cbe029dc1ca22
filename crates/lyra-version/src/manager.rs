use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use lyra_store::{BlobReader, BlobStore, PutHints};
use lyra_types::{BlobLocation, ContentHash, FileId, VersionId};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::catalog::FileCatalog;
use crate::error::{VersionError, VersionResult};
use crate::locks::FileLocks;
use crate::records::VersionRecordStore;
use crate::version::{
    CurrentContent, FileDescriptor, RollbackMode, Version, VersionOrder, VersionPage,
    VersionStatistics,
};

/// Owns the version history of every file.
///
/// Content goes through the blob store first, then a record is inserted.
/// Creation and deletion for one file are serialized by [`FileLocks`].
/// A store-wide content gate is held shared from `put` through record
/// insert and exclusive while a blob is reclaimed, so a blob that a new
/// version is about to reference is never deleted underneath it.
pub struct VersionManager {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn VersionRecordStore>,
    catalog: Arc<dyn FileCatalog>,
    locks: Arc<FileLocks>,
    content_gate: RwLock<()>,
}

impl VersionManager {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn VersionRecordStore>,
        catalog: Arc<dyn FileCatalog>,
        locks: Arc<FileLocks>,
    ) -> Self {
        Self {
            blobs,
            records,
            catalog,
            locks,
            content_gate: RwLock::new(()),
        }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn records(&self) -> &Arc<dyn VersionRecordStore> {
        &self.records
    }

    pub fn catalog(&self) -> &Arc<dyn FileCatalog> {
        &self.catalog
    }

    pub fn describe(&self, file: FileId) -> Option<FileDescriptor> {
        self.catalog.describe(file)
    }

    pub fn current(&self, file: FileId) -> Option<CurrentContent> {
        self.catalog.current(file)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Store `content` and record it as the file's next version.
    ///
    /// If the record cannot be inserted the stored blob is left in place for
    /// the orphan sweep and the error is returned.
    pub fn create_version(
        &self,
        file: FileId,
        content: &mut dyn Read,
        comment: Option<&str>,
        creator: &str,
    ) -> VersionResult<Version> {
        let _gate = self.content_gate.read().expect("content gate poisoned");
        let hints = self.put_hints(file);
        let stored = self.blobs.put(content, &hints)?;
        if stored.deduplicated {
            debug!(%file, hash = %stored.hash.short_hex(), "content already stored");
        }
        self.commit(file, stored.hash, stored.location, stored.size, comment, creator)
    }

    pub fn create_version_from_bytes(
        &self,
        file: FileId,
        content: &[u8],
        comment: Option<&str>,
        creator: &str,
    ) -> VersionResult<Version> {
        let mut reader = content;
        self.create_version(file, &mut reader, comment, creator)
    }

    /// Record a new version over a blob that is already stored.
    pub fn create_version_from_existing(
        &self,
        file: FileId,
        location: &BlobLocation,
        hash: ContentHash,
        size: u64,
        comment: Option<&str>,
        creator: &str,
    ) -> VersionResult<Version> {
        let _gate = self.content_gate.read().expect("content gate poisoned");
        if !self.blobs.exists(location)? {
            return Err(VersionError::BlobNotFound(location.clone()));
        }
        self.commit(file, hash, location.clone(), size, comment, creator)
    }

    fn put_hints(&self, file: FileId) -> PutHints {
        match self.catalog.describe(file) {
            Some(FileDescriptor {
                name,
                mime_type: Some(mime),
            }) => PutHints::new(name).with_content_type(mime),
            Some(FileDescriptor { name, .. }) => PutHints::new(name),
            None => PutHints::default(),
        }
    }

    fn commit(
        &self,
        file: FileId,
        hash: ContentHash,
        location: BlobLocation,
        size: u64,
        comment: Option<&str>,
        creator: &str,
    ) -> VersionResult<Version> {
        self.locks.with_lock(file, || {
            let number = self.next_version_number(file)?;
            let version = Version {
                id: VersionId::new(),
                file_id: file,
                number,
                hash,
                location,
                size,
                created_at: Utc::now(),
                created_by: creator.to_string(),
                comment: comment.map(str::to_string),
            };

            if let Err(e) = self.records.insert(&version) {
                warn!(
                    %file,
                    number,
                    location = %version.location,
                    error = %e,
                    "version record insert failed, blob left for orphan sweep"
                );
                return Err(e);
            }

            // A known file keeps the version and only logs a pointer failure.
            // An unknown file would be purged by the orphan sweep, so its
            // record is withdrawn and the error returned.
            if let Err(e) = self.catalog.set_current(file, &CurrentContent::from(&version)) {
                if self.catalog.file_exists(file) {
                    warn!(%file, number, error = %e, "failed to update current content");
                } else {
                    warn!(
                        %file,
                        number,
                        error = %e,
                        "file not registered, withdrawing version record"
                    );
                    self.records.remove(&version.id)?;
                    return Err(e);
                }
            }

            info!(%file, number, size, hash = %hash.short_hex(), "version created");
            Ok(version)
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_version(&self, file: FileId, number: u64) -> VersionResult<Option<Version>> {
        self.records.find(file, number)
    }

    pub fn get_by_id(&self, id: &VersionId) -> VersionResult<Option<Version>> {
        self.records.get(id)
    }

    pub fn get_latest(&self, file: FileId) -> VersionResult<Option<Version>> {
        Ok(self.records.list(file)?.pop())
    }

    pub fn get_first(&self, file: FileId) -> VersionResult<Option<Version>> {
        Ok(self.records.list(file)?.into_iter().next())
    }

    pub fn list_versions(&self, file: FileId, order: VersionOrder) -> VersionResult<Vec<Version>> {
        let mut versions = self.records.list(file)?;
        if order == VersionOrder::Descending {
            versions.reverse();
        }
        Ok(versions)
    }

    /// Versions numbered `from..=to`. Empty when `from > to`.
    pub fn versions_in_range(&self, file: FileId, from: u64, to: u64) -> VersionResult<Vec<Version>> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .records
            .list(file)?
            .into_iter()
            .filter(|v| (from..=to).contains(&v.number))
            .collect())
    }

    /// Versions created within `start..=end`. Empty when `start > end`.
    pub fn versions_in_time_range(
        &self,
        file: FileId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> VersionResult<Vec<Version>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .records
            .list(file)?
            .into_iter()
            .filter(|v| v.created_at >= start && v.created_at <= end)
            .collect())
    }

    /// The newest `limit` versions, newest first.
    pub fn latest_versions(&self, file: FileId, limit: usize) -> VersionResult<Vec<Version>> {
        let mut versions = self.list_versions(file, VersionOrder::Descending)?;
        versions.truncate(limit);
        Ok(versions)
    }

    pub fn count_versions(&self, file: FileId) -> VersionResult<u64> {
        self.records.count(file)
    }

    /// Bytes referenced by all versions of a file, counting shared content
    /// once per version.
    pub fn total_size(&self, file: FileId) -> VersionResult<u64> {
        Ok(self.records.list(file)?.iter().map(|v| v.size).sum())
    }

    pub fn version_exists(&self, file: FileId, number: u64) -> VersionResult<bool> {
        Ok(self.records.find(file, number)?.is_some())
    }

    /// Case-insensitive substring search over comments, newest first.
    pub fn search_by_comment(&self, file: FileId, keyword: &str) -> VersionResult<Vec<Version>> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .list_versions(file, VersionOrder::Descending)?
            .into_iter()
            .filter(|v| {
                v.comment
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains(&needle))
            })
            .collect())
    }

    /// The number the next created version of `file` would receive.
    pub fn next_version_number(&self, file: FileId) -> VersionResult<u64> {
        Ok(self.records.max_number(file)?.map_or(1, |n| n + 1))
    }

    /// Versions with a non-blank comment, newest first.
    pub fn versions_with_comment(&self, file: FileId) -> VersionResult<Vec<Version>> {
        let mut versions = self.list_versions(file, VersionOrder::Descending)?;
        versions.retain(Version::has_comment);
        Ok(versions)
    }

    /// Versions whose comment is missing or blank, newest first.
    pub fn versions_without_comment(&self, file: FileId) -> VersionResult<Vec<Version>> {
        let mut versions = self.list_versions(file, VersionOrder::Descending)?;
        versions.retain(|v| !v.has_comment());
        Ok(versions)
    }

    /// Versions strictly larger than `threshold` bytes, newest first.
    pub fn large_versions(&self, file: FileId, threshold: u64) -> VersionResult<Vec<Version>> {
        let mut versions = self.list_versions(file, VersionOrder::Descending)?;
        versions.retain(|v| v.size > threshold);
        Ok(versions)
    }

    /// Page `page` (zero-based) of `per_page` versions in `order`.
    pub fn versions_paged(
        &self,
        file: FileId,
        page: usize,
        per_page: usize,
        order: VersionOrder,
    ) -> VersionResult<VersionPage> {
        let versions = self.list_versions(file, order)?;
        let total = versions.len() as u64;
        let items = versions
            .into_iter()
            .skip(page.saturating_mul(per_page))
            .take(per_page)
            .collect();
        Ok(VersionPage {
            items,
            page,
            per_page,
            total,
        })
    }

    /// Versions whose content matches `pattern`, newest first.
    ///
    /// Without `is_regex` the pattern is matched literally. Content is read
    /// as lossy UTF-8; versions whose blob is gone are skipped.
    pub fn search_by_content(
        &self,
        file: FileId,
        pattern: &str,
        is_regex: bool,
    ) -> VersionResult<Vec<Version>> {
        let source = if is_regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let re = Regex::new(&source).map_err(|e| VersionError::InvalidPattern(e.to_string()))?;

        let mut matches = Vec::new();
        for version in self.list_versions(file, VersionOrder::Descending)? {
            let Some(content) = self.read_content(&version)? else {
                debug!(%file, number = version.number, "content missing, skipped in search");
                continue;
            };
            if re.is_match(&String::from_utf8_lossy(&content)) {
                matches.push(version);
            }
        }
        Ok(matches)
    }

    /// Versions grouped by content hash, keeping only groups of two or more.
    pub fn duplicate_versions(
        &self,
        file: FileId,
    ) -> VersionResult<BTreeMap<ContentHash, Vec<Version>>> {
        let mut groups: BTreeMap<ContentHash, Vec<Version>> = BTreeMap::new();
        for version in self.records.list(file)? {
            groups.entry(version.hash).or_default().push(version);
        }
        groups.retain(|_, versions| versions.len() > 1);
        Ok(groups)
    }

    pub fn statistics(&self, file: FileId) -> VersionResult<VersionStatistics> {
        Ok(VersionStatistics::from_versions(file, &self.records.list(file)?))
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    pub fn get_content(&self, id: &VersionId) -> VersionResult<Option<BlobReader>> {
        match self.records.get(id)? {
            Some(version) => self.open(&version),
            None => Ok(None),
        }
    }

    pub fn get_content_by_number(
        &self,
        file: FileId,
        number: u64,
    ) -> VersionResult<Option<BlobReader>> {
        match self.records.find(file, number)? {
            Some(version) => self.open(&version),
            None => Ok(None),
        }
    }

    /// Read a version's content fully into memory.
    pub fn read_content(&self, version: &Version) -> VersionResult<Option<Vec<u8>>> {
        let content = self.blobs.read_all(&version.location)?;
        if content.is_none() {
            warn!(
                file = %version.file_id,
                number = version.number,
                location = %version.location,
                "version content missing"
            );
        }
        Ok(content)
    }

    pub fn read_content_by_number(
        &self,
        file: FileId,
        number: u64,
    ) -> VersionResult<Option<Vec<u8>>> {
        match self.records.find(file, number)? {
            Some(version) => self.read_content(&version),
            None => Ok(None),
        }
    }

    fn open(&self, version: &Version) -> VersionResult<Option<BlobReader>> {
        let reader = self.blobs.get(&version.location)?;
        if reader.is_none() {
            warn!(
                file = %version.file_id,
                number = version.number,
                location = %version.location,
                "version content missing"
            );
        }
        Ok(reader)
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Delete a version record. Returns `false` if it does not exist or is
    /// the file's only version. The blob is left for [`Self::reclaim_blob`].
    pub fn delete_version(&self, id: &VersionId) -> VersionResult<bool> {
        let Some(version) = self.records.get(id)? else {
            debug!(%id, "delete of unknown version");
            return Ok(false);
        };
        let file = version.file_id;

        self.locks.with_lock(file, || {
            if self.records.get(id)?.is_none() {
                return Ok(false);
            }
            if self.records.count(file)? <= 1 {
                warn!(%file, number = version.number, "refusing to delete the only version");
                return Ok(false);
            }
            self.records.remove(id)?;
            // The record is gone; a stale pointer is logged, not reported.
            if let Err(e) = self.repoint_if_current(&version) {
                warn!(%file, number = version.number, error = %e, "failed to move current content");
            }
            info!(%file, number = version.number, "version deleted");
            Ok(true)
        })
    }

    pub fn delete_version_by_number(&self, file: FileId, number: u64) -> VersionResult<bool> {
        match self.records.find(file, number)? {
            Some(version) => self.delete_version(&version.id),
            None => Ok(false),
        }
    }

    /// Delete several versions, returning how many were removed.
    pub fn batch_delete(&self, ids: &[VersionId]) -> VersionResult<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.delete_version(id)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    // Caller holds the file lock.
    fn repoint_if_current(&self, deleted: &Version) -> VersionResult<()> {
        let file = deleted.file_id;
        let points_at_deleted = self
            .catalog
            .current(file)
            .is_some_and(|c| c.version_number == deleted.number);
        if !points_at_deleted {
            return Ok(());
        }
        if let Some(latest) = self.records.list(file)?.pop() {
            self.catalog.set_current(file, &CurrentContent::from(&latest))?;
            debug!(%file, number = latest.number, "current content moved to latest");
        }
        Ok(())
    }

    /// Delete every record of a file the catalog no longer knows.
    ///
    /// Returns the removed versions. A file that still exists is untouched.
    pub fn purge_orphaned_file(&self, file: FileId) -> VersionResult<Vec<Version>> {
        self.locks.with_lock(file, || {
            if self.catalog.file_exists(file) {
                return Ok(Vec::new());
            }
            let mut removed = Vec::new();
            for version in self.records.list(file)? {
                if let Some(v) = self.records.remove(&version.id)? {
                    removed.push(v);
                }
            }
            if !removed.is_empty() {
                info!(%file, versions = removed.len(), "orphaned version records removed");
            }
            Ok(removed)
        })
    }

    // -----------------------------------------------------------------------
    // Blob reclamation
    // -----------------------------------------------------------------------

    /// Delete a blob if no version of any file references `hash`.
    ///
    /// Returns the number of bytes freed, or `None` if the blob is still
    /// referenced or was already gone.
    pub fn reclaim_blob(
        &self,
        hash: &ContentHash,
        location: &BlobLocation,
    ) -> VersionResult<Option<u64>> {
        let _gate = self.content_gate.write().expect("content gate poisoned");
        if self.records.references(hash)? {
            debug!(hash = %hash.short_hex(), "blob still referenced");
            return Ok(None);
        }
        let Some(size) = self.blobs.size(location)? else {
            return Ok(None);
        };
        if self.blobs.delete(location)? {
            debug!(%location, size, "blob reclaimed");
            Ok(Some(size))
        } else {
            Ok(None)
        }
    }

    /// Delete every stored blob that no version record points at.
    ///
    /// Returns the removed locations with their sizes.
    pub fn reclaim_unreferenced(&self) -> VersionResult<Vec<(BlobLocation, u64)>> {
        let _gate = self.content_gate.write().expect("content gate poisoned");
        let referenced: BTreeSet<BlobLocation> = self
            .records
            .all()?
            .into_iter()
            .map(|v| v.location)
            .collect();

        let mut removed = Vec::new();
        for location in self.blobs.locations()? {
            if referenced.contains(&location) {
                continue;
            }
            let size = self.blobs.size(&location)?.unwrap_or(0);
            if self.blobs.delete(&location)? {
                debug!(%location, size, "unreferenced blob removed");
                removed.push((location, size));
            }
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Rollback
    // -----------------------------------------------------------------------

    /// Make version `target` the file's content again.
    ///
    /// `NewVersion` appends a version reusing the target's blob;
    /// `InPlace` only repoints the catalog and returns the target.
    pub fn rollback(
        &self,
        file: FileId,
        target: u64,
        mode: RollbackMode,
        operator: &str,
    ) -> VersionResult<Version> {
        let target_version = self
            .records
            .find(file, target)?
            .ok_or(VersionError::VersionNotFound { file, number: target })?;

        match mode {
            RollbackMode::NewVersion => {
                let comment = format!("Rollback to version {target}");
                let version = self.create_version_from_existing(
                    file,
                    &target_version.location,
                    target_version.hash,
                    target_version.size,
                    Some(&comment),
                    operator,
                )?;
                info!(%file, target, number = version.number, operator, "rolled back as new version");
                Ok(version)
            }
            RollbackMode::InPlace => {
                self.catalog
                    .set_current(file, &CurrentContent::from(&target_version))?;
                info!(%file, target, operator, "rolled back in place");
                Ok(target_version)
            }
        }
    }

    /// Roll back in place to the version before the current one.
    pub fn rollback_to_previous(&self, file: FileId, operator: &str) -> VersionResult<Version> {
        let versions = self.records.list(file)?;
        let current = match self.catalog.current(file) {
            Some(c) => c.version_number,
            None => versions
                .last()
                .map(|v| v.number)
                .ok_or(VersionError::NothingToRollBack(file))?,
        };
        let previous = versions
            .iter()
            .rev()
            .find(|v| v.number < current)
            .ok_or(VersionError::NothingToRollBack(file))?;
        self.rollback(file, previous.number, RollbackMode::InPlace, operator)
    }

    // -----------------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------------

    /// Recompute a version's content hash. `false` if the version or its
    /// blob is missing, or the bytes no longer match.
    pub fn verify_integrity(&self, id: &VersionId) -> VersionResult<bool> {
        let Some(version) = self.records.get(id)? else {
            return Ok(false);
        };
        let ok = self.blobs.verify(&version.location, &version.hash)?;
        if !ok {
            warn!(
                file = %version.file_id,
                number = version.number,
                "version failed integrity check"
            );
        }
        Ok(ok)
    }

    pub fn batch_verify(&self, ids: &[VersionId]) -> VersionResult<BTreeMap<VersionId, bool>> {
        ids.iter()
            .map(|id| Ok((*id, self.verify_integrity(id)?)))
            .collect()
    }
}

impl std::fmt::Debug for VersionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionManager")
            .field("files", &self.records.files().map(|f| f.len()).unwrap_or(0))
            .field("blobs", &self.blobs.stats().blob_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryFileCatalog;
    use crate::records::InMemoryVersionRecords;
    use lyra_store::{FsBlobStore, InMemoryBlobStore, StoreConfig};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    struct Fixture {
        manager: Arc<VersionManager>,
        blobs: Arc<InMemoryBlobStore>,
        catalog: Arc<InMemoryFileCatalog>,
    }

    fn fixture() -> Fixture {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let catalog = Arc::new(InMemoryFileCatalog::new());
        let manager = VersionManager::new(
            blobs.clone(),
            Arc::new(InMemoryVersionRecords::new()),
            catalog.clone(),
            Arc::new(FileLocks::new()),
        );
        Fixture {
            manager: Arc::new(manager),
            blobs,
            catalog,
        }
    }

    const FILE: FileId = FileId::new(1);

    /// Catalog whose pointer updates fail while `fail` is set.
    #[derive(Default)]
    struct FlakyCatalog {
        inner: InMemoryFileCatalog,
        fail: AtomicBool,
    }

    impl FileCatalog for FlakyCatalog {
        fn file_exists(&self, file: FileId) -> bool {
            self.inner.file_exists(file)
        }

        fn describe(&self, file: FileId) -> Option<FileDescriptor> {
            self.inner.describe(file)
        }

        fn set_current(&self, file: FileId, current: &CurrentContent) -> VersionResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(VersionError::Persistence("catalog offline".into()));
            }
            self.inner.set_current(file, current)
        }

        fn current(&self, file: FileId) -> Option<CurrentContent> {
            self.inner.current(file)
        }
    }

    fn flaky_manager() -> (VersionManager, Arc<FlakyCatalog>) {
        let catalog = Arc::new(FlakyCatalog::default());
        let manager = VersionManager::new(
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(InMemoryVersionRecords::new()),
            catalog.clone(),
            Arc::new(FileLocks::new()),
        );
        (manager, catalog)
    }

    fn create(m: &VersionManager, file: FileId, data: &[u8]) -> Version {
        m.create_version_from_bytes(file, data, None, "alice").unwrap()
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    #[test]
    fn numbers_start_at_one_and_increase() {
        let fx = fixture();
        let v1 = create(&fx.manager, FILE, b"one");
        let v2 = create(&fx.manager, FILE, b"two");
        assert_eq!((v1.number, v2.number), (1, 2));
        assert_eq!(v2.size, 3);
        assert_eq!(v2.hash, ContentHash::of(b"two"));
        assert_eq!(fx.catalog.current(FILE).unwrap().version_number, 2);
    }

    #[test]
    fn identical_content_across_files_is_stored_once() {
        let fx = fixture();
        let a = create(&fx.manager, FileId::new(1), b"same bytes");
        let b = create(&fx.manager, FileId::new(2), b"same bytes");
        assert_eq!(a.location, b.location);
        assert_eq!(fx.blobs.len(), 1);
    }

    #[test]
    fn empty_content_roundtrips() {
        let fx = fixture();
        let v = create(&fx.manager, FILE, b"");
        assert_eq!(v.size, 0);
        assert_eq!(v.hash, ContentHash::empty());
        assert_eq!(fx.manager.read_content(&v).unwrap().unwrap(), b"");
    }

    #[test]
    fn from_existing_requires_blob() {
        let fx = fixture();
        let missing = BlobLocation::for_hash(&ContentHash::of(b"nope"));
        let err = fx
            .manager
            .create_version_from_existing(FILE, &missing, ContentHash::of(b"nope"), 4, None, "a")
            .unwrap_err();
        assert!(matches!(err, VersionError::BlobNotFound(_)));
        assert_eq!(fx.manager.count_versions(FILE).unwrap(), 0);
    }

    #[test]
    fn concurrent_creators_get_distinct_consecutive_numbers() {
        let fx = fixture();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let manager = Arc::clone(&fx.manager);
                thread::spawn(move || {
                    (0..10)
                        .map(|i| {
                            let data = format!("thread {t} write {i}");
                            create(&manager, FILE, data.as_bytes()).number
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut numbers: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=80).collect::<Vec<_>>());
    }

    #[test]
    fn put_hints_come_from_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(FsBlobStore::open(StoreConfig::at(dir.path())).unwrap());
        let catalog = Arc::new(InMemoryFileCatalog::new());
        catalog.register(FILE, FileDescriptor::new("notes.txt").with_mime_type("text/plain"));
        let manager = VersionManager::new(
            blobs.clone(),
            Arc::new(InMemoryVersionRecords::new()),
            catalog,
            Arc::new(FileLocks::new()),
        );
        let v = create(&manager, FILE, b"on disk");
        assert!(blobs.path_of(&v.location).is_file());
        assert_eq!(manager.read_content(&v).unwrap().unwrap(), b"on disk");
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn first_latest_and_ordering() {
        let fx = fixture();
        for data in [b"a", b"b", b"c"] {
            create(&fx.manager, FILE, data);
        }
        assert_eq!(fx.manager.get_first(FILE).unwrap().unwrap().number, 1);
        assert_eq!(fx.manager.get_latest(FILE).unwrap().unwrap().number, 3);
        let desc: Vec<u64> = fx
            .manager
            .list_versions(FILE, VersionOrder::Descending)
            .unwrap()
            .iter()
            .map(|v| v.number)
            .collect();
        assert_eq!(desc, vec![3, 2, 1]);
        assert_eq!(fx.manager.latest_versions(FILE, 2).unwrap().len(), 2);
        assert!(fx.manager.get_latest(FileId::new(99)).unwrap().is_none());
    }

    #[test]
    fn ranges_are_inclusive_and_empty_when_inverted() {
        let fx = fixture();
        for i in 0..5u8 {
            create(&fx.manager, FILE, &[i]);
        }
        let numbers: Vec<u64> = fx
            .manager
            .versions_in_range(FILE, 2, 4)
            .unwrap()
            .iter()
            .map(|v| v.number)
            .collect();
        assert_eq!(numbers, vec![2, 3, 4]);
        assert!(fx.manager.versions_in_range(FILE, 4, 2).unwrap().is_empty());

        let now = Utc::now();
        let hour = chrono::Duration::hours(1);
        assert_eq!(
            fx.manager
                .versions_in_time_range(FILE, now - hour, now + hour)
                .unwrap()
                .len(),
            5
        );
        assert!(fx
            .manager
            .versions_in_time_range(FILE, now + hour, now - hour)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn comment_search_is_case_insensitive() {
        let fx = fixture();
        fx.manager
            .create_version_from_bytes(FILE, b"1", Some("Initial Import"), "a")
            .unwrap();
        fx.manager
            .create_version_from_bytes(FILE, b"2", Some("fix typo"), "a")
            .unwrap();
        fx.manager.create_version_from_bytes(FILE, b"3", None, "a").unwrap();

        let hits = fx.manager.search_by_comment(FILE, "IMPORT").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].number, 1);
        assert!(fx.manager.search_by_comment(FILE, "  ").unwrap().is_empty());
    }

    #[test]
    fn next_number_follows_highest() {
        let fx = fixture();
        assert_eq!(fx.manager.next_version_number(FILE).unwrap(), 1);
        create(&fx.manager, FILE, b"a");
        let v2 = create(&fx.manager, FILE, b"b");
        create(&fx.manager, FILE, b"c");
        assert!(fx.manager.delete_version(&v2.id).unwrap());
        assert_eq!(fx.manager.next_version_number(FILE).unwrap(), 4);
    }

    #[test]
    fn comment_and_size_filters() {
        let fx = fixture();
        let m = &fx.manager;
        m.create_version_from_bytes(FILE, b"small", Some("first draft"), "a").unwrap();
        m.create_version_from_bytes(FILE, b"a bit larger", None, "a").unwrap();
        m.create_version_from_bytes(FILE, b"largest of them all", Some("  "), "a").unwrap();
        m.create_version_from_bytes(FILE, b"tiny", Some("final"), "a").unwrap();

        let numbers = |vs: Vec<Version>| vs.iter().map(|v| v.number).collect::<Vec<_>>();
        assert_eq!(numbers(m.versions_with_comment(FILE).unwrap()), vec![4, 1]);
        assert_eq!(numbers(m.versions_without_comment(FILE).unwrap()), vec![3, 2]);
        assert_eq!(numbers(m.large_versions(FILE, 5).unwrap()), vec![3, 2]);
        assert!(m.large_versions(FILE, 100).unwrap().is_empty());
    }

    #[test]
    fn paging_reports_totals() {
        let fx = fixture();
        for i in 0..5u8 {
            create(&fx.manager, FILE, &[i]);
        }
        let page = fx
            .manager
            .versions_paged(FILE, 1, 2, VersionOrder::Descending)
            .unwrap();
        let numbers: Vec<u64> = page.items.iter().map(|v| v.number).collect();
        assert_eq!(numbers, vec![3, 2]);
        assert_eq!((page.total, page.total_pages()), (5, 3));
        assert!(page.has_next());

        let last = fx
            .manager
            .versions_paged(FILE, 2, 2, VersionOrder::Ascending)
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_next());
        let beyond = fx
            .manager
            .versions_paged(FILE, 9, 2, VersionOrder::Ascending)
            .unwrap();
        assert!(beyond.items.is_empty());
    }

    #[test]
    fn content_search_literal_and_regex() {
        let fx = fixture();
        create(&fx.manager, FILE, b"price: 1+1 units\n");
        create(&fx.manager, FILE, b"price: 11 units\n");
        create(&fx.manager, FILE, b"nothing here\n");

        let numbers = |vs: Vec<Version>| vs.iter().map(|v| v.number).collect::<Vec<_>>();
        let literal = fx.manager.search_by_content(FILE, "1+1", false).unwrap();
        assert_eq!(numbers(literal), vec![1]);
        let regex = fx.manager.search_by_content(FILE, "1+1", true).unwrap();
        assert_eq!(numbers(regex), vec![2]);
        let wildcard = fx.manager.search_by_content(FILE, "u.its", true).unwrap();
        assert_eq!(numbers(wildcard), vec![2, 1]);
        let anchored = fx.manager.search_by_content(FILE, r"^price: \d+ ", true).unwrap();
        assert_eq!(numbers(anchored), vec![2]);

        let err = fx.manager.search_by_content(FILE, "(unclosed", true).unwrap_err();
        assert!(matches!(err, VersionError::InvalidPattern(_)));
    }

    #[test]
    fn duplicates_and_statistics() {
        let fx = fixture();
        create(&fx.manager, FILE, b"aaaa");
        create(&fx.manager, FILE, b"bb");
        create(&fx.manager, FILE, b"aaaa");

        let dups = fx.manager.duplicate_versions(FILE).unwrap();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[&ContentHash::of(b"aaaa")].len(), 2);

        let stats = fx.manager.statistics(FILE).unwrap();
        assert_eq!(stats.total_versions, 3);
        assert_eq!(stats.total_bytes, 10);
        assert_eq!(stats.unique_bytes, 6);
        assert_eq!(fx.manager.total_size(FILE).unwrap(), 10);
        assert!(fx.manager.version_exists(FILE, 3).unwrap());
        assert!(!fx.manager.version_exists(FILE, 4).unwrap());
    }

    #[test]
    fn content_by_id_and_number() {
        let fx = fixture();
        let v = create(&fx.manager, FILE, b"payload");
        let mut buf = Vec::new();
        fx.manager
            .get_content(&v.id)
            .unwrap()
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(buf, b"payload");
        assert!(fx.manager.get_content_by_number(FILE, 1).unwrap().is_some());
        assert!(fx.manager.get_content(&VersionId::new()).unwrap().is_none());
        assert!(fx.manager.read_content_by_number(FILE, 2).unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    #[test]
    fn only_version_cannot_be_deleted() {
        let fx = fixture();
        let v = create(&fx.manager, FILE, b"solo");
        assert!(!fx.manager.delete_version(&v.id).unwrap());
        assert_eq!(fx.manager.count_versions(FILE).unwrap(), 1);
    }

    #[test]
    fn delete_unknown_is_false() {
        let fx = fixture();
        assert!(!fx.manager.delete_version(&VersionId::new()).unwrap());
        assert!(!fx.manager.delete_version_by_number(FILE, 7).unwrap());
    }

    #[test]
    fn delete_keeps_blob_until_reclaimed() {
        let fx = fixture();
        let v1 = create(&fx.manager, FILE, b"old");
        create(&fx.manager, FILE, b"new");
        assert!(fx.manager.delete_version(&v1.id).unwrap());
        assert!(fx.blobs.exists(&v1.location).unwrap());

        assert_eq!(fx.manager.reclaim_blob(&v1.hash, &v1.location).unwrap(), Some(3));
        assert!(!fx.blobs.exists(&v1.location).unwrap());
        assert_eq!(fx.manager.reclaim_blob(&v1.hash, &v1.location).unwrap(), None);
    }

    #[test]
    fn shared_blob_is_not_reclaimed() {
        let fx = fixture();
        let a1 = create(&fx.manager, FileId::new(1), b"shared");
        create(&fx.manager, FileId::new(1), b"other");
        create(&fx.manager, FileId::new(2), b"shared");

        assert!(fx.manager.delete_version(&a1.id).unwrap());
        assert_eq!(fx.manager.reclaim_blob(&a1.hash, &a1.location).unwrap(), None);
        assert!(fx.blobs.exists(&a1.location).unwrap());
    }

    #[test]
    fn concurrent_deletes_never_empty_a_file() {
        let fx = fixture();
        let ids: Vec<VersionId> = (0..6u8).map(|i| create(&fx.manager, FILE, &[i]).id).collect();

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let manager = Arc::clone(&fx.manager);
                thread::spawn(move || manager.delete_version(&id).unwrap())
            })
            .collect();
        let deleted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| *d)
            .count();

        assert_eq!(deleted, 5);
        assert_eq!(fx.manager.count_versions(FILE).unwrap(), 1);
    }

    #[test]
    fn deleting_current_moves_pointer_to_latest() {
        let fx = fixture();
        create(&fx.manager, FILE, b"1");
        create(&fx.manager, FILE, b"2");
        let v3 = create(&fx.manager, FILE, b"3");
        assert!(fx.manager.delete_version(&v3.id).unwrap());
        assert_eq!(fx.catalog.current(FILE).unwrap().version_number, 2);
    }

    #[test]
    fn delete_succeeds_when_pointer_update_fails() {
        let (m, catalog) = flaky_manager();
        create(&m, FILE, b"1");
        create(&m, FILE, b"2");
        let v3 = create(&m, FILE, b"3");

        catalog.fail.store(true, Ordering::SeqCst);
        assert!(m.delete_version(&v3.id).unwrap());
        assert_eq!(m.count_versions(FILE).unwrap(), 2);
        assert!(!m.delete_version(&v3.id).unwrap());
    }

    #[test]
    fn unregistered_first_version_is_withdrawn_on_pointer_failure() {
        let (m, catalog) = flaky_manager();
        catalog.fail.store(true, Ordering::SeqCst);
        let err = m.create_version_from_bytes(FILE, b"lost", None, "alice").unwrap_err();
        assert!(matches!(err, VersionError::Persistence(_)));
        assert_eq!(m.count_versions(FILE).unwrap(), 0);
        assert_eq!(m.next_version_number(FILE).unwrap(), 1);
    }

    #[test]
    fn registered_file_keeps_version_on_pointer_failure() {
        let (m, catalog) = flaky_manager();
        catalog.inner.register(FILE, FileDescriptor::new("a.txt"));
        catalog.fail.store(true, Ordering::SeqCst);
        let v = create(&m, FILE, b"kept");
        assert_eq!(v.number, 1);
        assert_eq!(m.count_versions(FILE).unwrap(), 1);
        assert!(catalog.current(FILE).is_none());
    }

    #[test]
    fn batch_delete_counts_removed() {
        let fx = fixture();
        let v1 = create(&fx.manager, FILE, b"1");
        let v2 = create(&fx.manager, FILE, b"2");
        let v3 = create(&fx.manager, FILE, b"3");
        let deleted = fx
            .manager
            .batch_delete(&[v1.id, v2.id, v3.id, VersionId::new()])
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(fx.manager.count_versions(FILE).unwrap(), 1);
    }

    #[test]
    fn purge_only_touches_unknown_files() {
        let fx = fixture();
        create(&fx.manager, FILE, b"1");
        create(&fx.manager, FILE, b"2");
        assert!(fx.manager.purge_orphaned_file(FILE).unwrap().is_empty());

        fx.catalog.remove_file(FILE);
        assert_eq!(fx.manager.purge_orphaned_file(FILE).unwrap().len(), 2);
        assert_eq!(fx.manager.count_versions(FILE).unwrap(), 0);

        let removed = fx.manager.reclaim_unreferenced().unwrap();
        assert_eq!(removed.len(), 2);
        assert!(fx.blobs.is_empty());
    }

    // -----------------------------------------------------------------------
    // Rollback
    // -----------------------------------------------------------------------

    #[test]
    fn rollback_as_new_version_reuses_blob() {
        let fx = fixture();
        let v1 = create(&fx.manager, FILE, b"hello");
        create(&fx.manager, FILE, b"world");

        let v3 = fx
            .manager
            .rollback(FILE, 1, RollbackMode::NewVersion, "bob")
            .unwrap();
        assert_eq!(v3.number, 3);
        assert_eq!(v3.location, v1.location);
        assert_eq!(v3.comment.as_deref(), Some("Rollback to version 1"));
        assert_eq!(v3.created_by, "bob");
        assert_eq!(fx.blobs.len(), 2);
    }

    #[test]
    fn rollback_in_place_repoints_current() {
        let fx = fixture();
        create(&fx.manager, FILE, b"a");
        create(&fx.manager, FILE, b"b");
        let target = fx
            .manager
            .rollback(FILE, 1, RollbackMode::InPlace, "bob")
            .unwrap();
        assert_eq!(target.number, 1);
        assert_eq!(fx.manager.count_versions(FILE).unwrap(), 2);
        assert_eq!(fx.catalog.current(FILE).unwrap().hash, ContentHash::of(b"a"));
    }

    #[test]
    fn rollback_to_missing_version_fails() {
        let fx = fixture();
        create(&fx.manager, FILE, b"a");
        let err = fx
            .manager
            .rollback(FILE, 9, RollbackMode::NewVersion, "bob")
            .unwrap_err();
        assert!(matches!(err, VersionError::VersionNotFound { number: 9, .. }));
    }

    #[test]
    fn rollback_to_previous_walks_back() {
        let fx = fixture();
        create(&fx.manager, FILE, b"1");
        create(&fx.manager, FILE, b"2");
        create(&fx.manager, FILE, b"3");

        assert_eq!(fx.manager.rollback_to_previous(FILE, "op").unwrap().number, 2);
        assert_eq!(fx.manager.rollback_to_previous(FILE, "op").unwrap().number, 1);
        let err = fx.manager.rollback_to_previous(FILE, "op").unwrap_err();
        assert!(matches!(err, VersionError::NothingToRollBack(_)));
    }

    // -----------------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------------

    #[test]
    fn integrity_detects_corruption() {
        let fx = fixture();
        let good = create(&fx.manager, FileId::new(1), b"good");
        let bad = create(&fx.manager, FileId::new(2), b"bad");
        fx.blobs.corrupt(&bad.location, b"tampered".to_vec());

        assert!(fx.manager.verify_integrity(&good.id).unwrap());
        assert!(!fx.manager.verify_integrity(&bad.id).unwrap());
        assert!(!fx.manager.verify_integrity(&VersionId::new()).unwrap());

        let report = fx.manager.batch_verify(&[good.id, bad.id]).unwrap();
        assert!(report[&good.id]);
        assert!(!report[&bad.id]);
    }

    proptest::proptest! {
        #[test]
        fn stored_content_reads_back(data: Vec<u8>) {
            let fx = fixture();
            let v = create(&fx.manager, FILE, &data);
            proptest::prop_assert_eq!(v.size, data.len() as u64);
            let read = fx.manager.read_content(&v).unwrap().unwrap();
            proptest::prop_assert_eq!(read, data);
        }
    }
}
