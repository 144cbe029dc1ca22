use std::collections::BTreeMap;
use std::sync::RwLock;

use lyra_types::FileId;
use serde::{Deserialize, Serialize};

use crate::error::VersionResult;
use crate::version::{CurrentContent, FileDescriptor};

/// Callback boundary to the layer that owns file identity.
///
/// The version manager reads descriptors for naming and classification and
/// reports the file's current content after every creation or rollback. A
/// file the catalog no longer knows is treated as deleted by the orphan
/// sweep.
pub trait FileCatalog: Send + Sync {
    fn file_exists(&self, file: FileId) -> bool;

    fn describe(&self, file: FileId) -> Option<FileDescriptor>;

    /// Record the file's current content. Unknown files are registered
    /// without a descriptor.
    fn set_current(&self, file: FileId, current: &CurrentContent) -> VersionResult<()>;

    fn current(&self, file: FileId) -> Option<CurrentContent>;
}

/// One catalog row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub file_id: FileId,
    pub descriptor: Option<FileDescriptor>,
    pub current: Option<CurrentContent>,
}

/// In-memory file catalog.
#[derive(Default)]
pub struct InMemoryFileCatalog {
    entries: RwLock<BTreeMap<FileId, CatalogEntry>>,
}

impl InMemoryFileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().map(|e| (e.file_id, e)).collect()),
        }
    }

    /// Register a file, or replace the descriptor of a known one.
    pub fn register(&self, file: FileId, descriptor: FileDescriptor) {
        let mut entries = self.entries.write().expect("lock poisoned");
        entries
            .entry(file)
            .and_modify(|e| e.descriptor = Some(descriptor.clone()))
            .or_insert(CatalogEntry {
                file_id: file,
                descriptor: Some(descriptor),
                current: None,
            });
    }

    /// Forget a file. Returns `true` if it was known.
    pub fn remove_file(&self, file: FileId) -> bool {
        self.entries
            .write()
            .expect("lock poisoned")
            .remove(&file)
            .is_some()
    }

    pub fn files(&self) -> Vec<FileId> {
        self.entries
            .read()
            .expect("lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    pub fn snapshot(&self) -> Vec<CatalogEntry> {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub(crate) fn replace_all(&self, entries: Vec<CatalogEntry>) {
        *self.entries.write().expect("lock poisoned") =
            entries.into_iter().map(|e| (e.file_id, e)).collect();
    }
}

impl FileCatalog for InMemoryFileCatalog {
    fn file_exists(&self, file: FileId) -> bool {
        self.entries.read().expect("lock poisoned").contains_key(&file)
    }

    fn describe(&self, file: FileId) -> Option<FileDescriptor> {
        self.entries
            .read()
            .expect("lock poisoned")
            .get(&file)
            .and_then(|e| e.descriptor.clone())
    }

    fn set_current(&self, file: FileId, current: &CurrentContent) -> VersionResult<()> {
        let mut entries = self.entries.write().expect("lock poisoned");
        entries
            .entry(file)
            .or_insert(CatalogEntry {
                file_id: file,
                descriptor: None,
                current: None,
            })
            .current = Some(current.clone());
        Ok(())
    }

    fn current(&self, file: FileId) -> Option<CurrentContent> {
        self.entries
            .read()
            .expect("lock poisoned")
            .get(&file)
            .and_then(|e| e.current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_types::{BlobLocation, ContentHash};

    fn current(number: u64) -> CurrentContent {
        let hash = ContentHash::of(&number.to_le_bytes());
        CurrentContent {
            version_number: number,
            hash,
            location: BlobLocation::for_hash(&hash),
            size: 8,
        }
    }

    #[test]
    fn register_and_describe() {
        let catalog = InMemoryFileCatalog::new();
        let file = FileId::new(1);
        assert!(!catalog.file_exists(file));
        catalog.register(file, FileDescriptor::new("notes.md"));
        assert!(catalog.file_exists(file));
        assert_eq!(catalog.describe(file).unwrap().name, "notes.md");
    }

    #[test]
    fn set_current_registers_unknown_file() {
        let catalog = InMemoryFileCatalog::new();
        let file = FileId::new(2);
        catalog.set_current(file, &current(1)).unwrap();
        assert!(catalog.file_exists(file));
        assert!(catalog.describe(file).is_none());
        assert_eq!(catalog.current(file).unwrap().version_number, 1);
    }

    #[test]
    fn register_keeps_current_pointer() {
        let catalog = InMemoryFileCatalog::new();
        let file = FileId::new(3);
        catalog.set_current(file, &current(4)).unwrap();
        catalog.register(file, FileDescriptor::new("a.txt").with_mime_type("text/plain"));
        assert_eq!(catalog.current(file).unwrap().version_number, 4);
        assert_eq!(
            catalog.describe(file).unwrap().mime_type.as_deref(),
            Some("text/plain")
        );
    }

    #[test]
    fn remove_file_forgets() {
        let catalog = InMemoryFileCatalog::new();
        let file = FileId::new(4);
        catalog.register(file, FileDescriptor::new("x"));
        assert!(catalog.remove_file(file));
        assert!(!catalog.remove_file(file));
        assert!(!catalog.file_exists(file));
        assert!(catalog.current(file).is_none());
    }
}
