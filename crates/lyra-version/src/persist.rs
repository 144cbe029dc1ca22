//! JSON-file persistence for version records and the file catalog.
//!
//! Each store keeps its full state in memory and rewrites a single JSON
//! snapshot after every mutation: serialize to a temp file in the target
//! directory, fsync, then rename over the previous snapshot. A crash
//! therefore leaves either the old or the new snapshot, never a torn one.
//! A mutation whose snapshot cannot be written is undone in memory and
//! reported as an error.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lyra_types::{ContentHash, FileId, VersionId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::catalog::{CatalogEntry, FileCatalog, InMemoryFileCatalog};
use crate::error::VersionResult;
use crate::records::{InMemoryVersionRecords, VersionRecordStore};
use crate::version::{CurrentContent, FileDescriptor, Version};

fn load_snapshot<T: DeserializeOwned>(path: &Path) -> VersionResult<Vec<T>> {
    match File::open(path) {
        Ok(file) => Ok(serde_json::from_reader(BufReader::new(file))?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_snapshot<T: Serialize>(path: &Path, items: &[T]) -> VersionResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, items)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    debug!(path = %path.display(), entries = items.len(), "snapshot written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Version records
// ---------------------------------------------------------------------------

/// Version record store backed by a JSON snapshot file.
pub struct JsonVersionRecords {
    path: PathBuf,
    inner: InMemoryVersionRecords,
    write_lock: Mutex<()>,
}

impl JsonVersionRecords {
    /// Open the snapshot at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> VersionResult<Self> {
        let path = path.into();
        let inner = InMemoryVersionRecords::from_versions(load_snapshot::<Version>(&path)?)?;
        info!(path = %path.display(), records = inner.len(), "version records loaded");
        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> VersionResult<()> {
        write_snapshot(&self.path, &self.inner.snapshot())
    }
}

impl VersionRecordStore for JsonVersionRecords {
    fn insert(&self, version: &Version) -> VersionResult<()> {
        let _guard = self.write_lock.lock().expect("lock poisoned");
        self.inner.insert(version)?;
        if let Err(e) = self.save() {
            self.inner.remove(&version.id)?;
            return Err(e);
        }
        Ok(())
    }

    fn get(&self, id: &VersionId) -> VersionResult<Option<Version>> {
        self.inner.get(id)
    }

    fn find(&self, file: FileId, number: u64) -> VersionResult<Option<Version>> {
        self.inner.find(file, number)
    }

    fn list(&self, file: FileId) -> VersionResult<Vec<Version>> {
        self.inner.list(file)
    }

    fn remove(&self, id: &VersionId) -> VersionResult<Option<Version>> {
        let _guard = self.write_lock.lock().expect("lock poisoned");
        let Some(removed) = self.inner.remove(id)? else {
            return Ok(None);
        };
        if let Err(e) = self.save() {
            self.inner.insert(&removed)?;
            return Err(e);
        }
        Ok(Some(removed))
    }

    fn files(&self) -> VersionResult<Vec<FileId>> {
        self.inner.files()
    }

    fn references(&self, hash: &ContentHash) -> VersionResult<bool> {
        self.inner.references(hash)
    }

    fn all(&self) -> VersionResult<Vec<Version>> {
        self.inner.all()
    }

    fn count(&self, file: FileId) -> VersionResult<u64> {
        self.inner.count(file)
    }

    fn max_number(&self, file: FileId) -> VersionResult<Option<u64>> {
        self.inner.max_number(file)
    }
}

// ---------------------------------------------------------------------------
// File catalog
// ---------------------------------------------------------------------------

/// File catalog backed by a JSON snapshot file.
pub struct JsonFileCatalog {
    path: PathBuf,
    inner: InMemoryFileCatalog,
    write_lock: Mutex<()>,
}

impl JsonFileCatalog {
    pub fn open(path: impl Into<PathBuf>) -> VersionResult<Self> {
        let path = path.into();
        let entries = load_snapshot::<CatalogEntry>(&path)?;
        info!(path = %path.display(), files = entries.len(), "file catalog loaded");
        Ok(Self {
            path,
            inner: InMemoryFileCatalog::from_entries(entries),
            write_lock: Mutex::new(()),
        })
    }

    pub fn register(&self, file: FileId, descriptor: FileDescriptor) -> VersionResult<()> {
        self.mutate(|catalog| {
            catalog.register(file, descriptor);
            Ok(())
        })
    }

    /// Forget a file. Its versions become orphans for the next sweep.
    pub fn remove_file(&self, file: FileId) -> VersionResult<bool> {
        self.mutate(|catalog| Ok(catalog.remove_file(file)))
    }

    pub fn files(&self) -> Vec<FileId> {
        self.inner.files()
    }

    fn mutate<T>(&self, f: impl FnOnce(&InMemoryFileCatalog) -> VersionResult<T>) -> VersionResult<T> {
        let _guard = self.write_lock.lock().expect("lock poisoned");
        let before = self.inner.snapshot();
        let out = f(&self.inner)?;
        if let Err(e) = write_snapshot(&self.path, &self.inner.snapshot()) {
            self.inner.replace_all(before);
            return Err(e);
        }
        Ok(out)
    }
}

impl FileCatalog for JsonFileCatalog {
    fn file_exists(&self, file: FileId) -> bool {
        self.inner.file_exists(file)
    }

    fn describe(&self, file: FileId) -> Option<FileDescriptor> {
        self.inner.describe(file)
    }

    fn set_current(&self, file: FileId, current: &CurrentContent) -> VersionResult<()> {
        self.mutate(|catalog| catalog.set_current(file, current))
    }

    fn current(&self, file: FileId) -> Option<CurrentContent> {
        self.inner.current(file)
    }
}
