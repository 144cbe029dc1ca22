use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use lyra_types::{ContentHash, FileId, VersionId};

use crate::error::{VersionError, VersionResult};
use crate::version::Version;

/// Persistence boundary for version records.
///
/// Implementations must reject an insert whose `(file_id, number)` pair is
/// already present, and `list` must return a file's versions in ascending
/// number order.
pub trait VersionRecordStore: Send + Sync {
    fn insert(&self, version: &Version) -> VersionResult<()>;

    fn get(&self, id: &VersionId) -> VersionResult<Option<Version>>;

    fn find(&self, file: FileId, number: u64) -> VersionResult<Option<Version>>;

    fn list(&self, file: FileId) -> VersionResult<Vec<Version>>;

    /// Remove a record. Returns the removed version if it existed.
    fn remove(&self, id: &VersionId) -> VersionResult<Option<Version>>;

    /// All files with at least one record.
    fn files(&self) -> VersionResult<Vec<FileId>>;

    /// Whether any record of any file points at `hash`.
    fn references(&self, hash: &ContentHash) -> VersionResult<bool>;

    fn all(&self) -> VersionResult<Vec<Version>>;

    fn count(&self, file: FileId) -> VersionResult<u64> {
        Ok(self.list(file)?.len() as u64)
    }

    fn max_number(&self, file: FileId) -> VersionResult<Option<u64>> {
        Ok(self.list(file)?.last().map(|v| v.number))
    }
}

/// In-memory record store for tests, local demos, and embedding.
pub struct InMemoryVersionRecords {
    inner: RwLock<RecordState>,
}

#[derive(Default)]
struct RecordState {
    by_id: HashMap<VersionId, Version>,
    by_file: BTreeMap<FileId, BTreeMap<u64, VersionId>>,
}

impl RecordState {
    fn insert(&mut self, version: &Version) -> VersionResult<()> {
        let numbers = self.by_file.entry(version.file_id).or_default();
        if numbers.contains_key(&version.number) {
            return Err(VersionError::DuplicateVersion {
                file: version.file_id,
                number: version.number,
            });
        }
        numbers.insert(version.number, version.id);
        self.by_id.insert(version.id, version.clone());
        Ok(())
    }

    fn remove(&mut self, id: &VersionId) -> Option<Version> {
        let version = self.by_id.remove(id)?;
        if let Some(numbers) = self.by_file.get_mut(&version.file_id) {
            numbers.remove(&version.number);
            if numbers.is_empty() {
                self.by_file.remove(&version.file_id);
            }
        }
        Some(version)
    }

    fn list(&self, file: FileId) -> Vec<Version> {
        self.by_file
            .get(&file)
            .map(|numbers| {
                numbers
                    .values()
                    .filter_map(|id| self.by_id.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl InMemoryVersionRecords {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RecordState::default()),
        }
    }

    /// Build a store from previously persisted records.
    pub fn from_versions(versions: impl IntoIterator<Item = Version>) -> VersionResult<Self> {
        let mut state = RecordState::default();
        for version in versions {
            state.insert(&version)?;
        }
        Ok(Self {
            inner: RwLock::new(state),
        })
    }

    /// All records ordered by file, then number.
    pub fn snapshot(&self) -> Vec<Version> {
        let state = self.inner.read().expect("lock poisoned");
        state
            .by_file
            .keys()
            .flat_map(|file| state.list(*file))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryVersionRecords {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionRecordStore for InMemoryVersionRecords {
    fn insert(&self, version: &Version) -> VersionResult<()> {
        self.inner.write().expect("lock poisoned").insert(version)
    }

    fn get(&self, id: &VersionId) -> VersionResult<Option<Version>> {
        Ok(self.inner.read().expect("lock poisoned").by_id.get(id).cloned())
    }

    fn find(&self, file: FileId, number: u64) -> VersionResult<Option<Version>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state
            .by_file
            .get(&file)
            .and_then(|numbers| numbers.get(&number))
            .and_then(|id| state.by_id.get(id))
            .cloned())
    }

    fn list(&self, file: FileId) -> VersionResult<Vec<Version>> {
        Ok(self.inner.read().expect("lock poisoned").list(file))
    }

    fn remove(&self, id: &VersionId) -> VersionResult<Option<Version>> {
        Ok(self.inner.write().expect("lock poisoned").remove(id))
    }

    fn files(&self) -> VersionResult<Vec<FileId>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.by_file.keys().copied().collect())
    }

    fn references(&self, hash: &ContentHash) -> VersionResult<bool> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.by_id.values().any(|v| v.hash == *hash))
    }

    fn all(&self) -> VersionResult<Vec<Version>> {
        Ok(self.snapshot())
    }

    fn count(&self, file: FileId) -> VersionResult<u64> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.by_file.get(&file).map_or(0, |n| n.len() as u64))
    }

    fn max_number(&self, file: FileId) -> VersionResult<Option<u64>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state
            .by_file
            .get(&file)
            .and_then(|numbers| numbers.keys().next_back().copied()))
    }
}
