use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use lyra_crypto::HashingWriter;
use lyra_types::BlobLocation;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::blob::{BlobReader, PutHints, StoreStats, StoredBlob};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

/// Filesystem blob store.
///
/// Layout under the configured root:
///
/// ```text
/// objects/ab/cd/abcd…   promoted blobs, bucketed by hash prefix
/// staging/*.tmp         in-flight writes, never read by `get`
/// ```
///
/// A `put` streams into a staging file while hashing, then promotes it with
/// a no-clobber rename. Because identical content always maps to the same
/// target path, a concurrent writer that loses the promote race simply
/// discards its staged copy.
pub struct FsBlobStore {
    objects: PathBuf,
    staging: PathBuf,
    config: StoreConfig,
}

impl FsBlobStore {
    /// Open (or create) a store at `config.root`.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let objects = config.objects_dir();
        let staging = config.staging_dir();
        fs::create_dir_all(&objects)?;
        fs::create_dir_all(&staging)?;
        info!(root = %config.root.display(), "blob store opened");
        Ok(Self {
            objects,
            staging,
            config,
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Absolute path of a location.
    pub fn path_of(&self, location: &BlobLocation) -> PathBuf {
        self.objects.join(location.to_path())
    }

    /// Remove staging files older than the configured `staging_max_age`.
    ///
    /// Staging files are normally deleted when their write finishes or
    /// fails; anything left behind belongs to a crashed process. Returns the
    /// number of files removed.
    pub fn cleanup_staging(&self) -> StoreResult<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(self.config.staging_max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        for entry in fs::read_dir(&self.staging)? {
            let entry = entry?;
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            let stale = meta.modified().map(|m| m < cutoff).unwrap_or(false);
            if !stale {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove stale staging file"),
            }
        }
        if removed > 0 {
            info!(removed, "cleaned up stale staging files");
        }
        Ok(removed)
    }

    fn stage(&self, hints: &PutHints) -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(&hints.staging_prefix())
            .suffix(".tmp")
            .tempfile_in(&self.staging)
    }

    /// Promote a staged file to `target` without overwriting.
    ///
    /// Returns `true` if this call created the blob, `false` if another
    /// writer got there first.
    fn promote(&self, staged: NamedTempFile, target: &Path) -> io::Result<bool> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        match staged.persist_noclobber(target) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.error),
        }
    }

    fn walk_blobs(&self) -> impl Iterator<Item = walkdir::DirEntry> + '_ {
        WalkDir::new(&self.objects)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
    }

    fn relative_location(&self, path: &Path) -> Option<BlobLocation> {
        let rel = path.strip_prefix(&self.objects).ok()?;
        let joined = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        BlobLocation::parse(joined).ok()
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, reader: &mut dyn Read, hints: &PutHints) -> StoreResult<StoredBlob> {
        let staged = self.stage(hints)?;
        let mut writer = HashingWriter::new(BufWriter::new(staged));

        match self.config.max_blob_size {
            Some(limit) => {
                let mut limited = reader.take(limit.saturating_add(1));
                io::copy(&mut limited, &mut writer)?;
                if writer.written() > limit {
                    // Dropping the writer deletes the staged file.
                    return Err(StoreError::TooLarge { limit });
                }
            }
            None => {
                io::copy(reader, &mut writer)?;
            }
        }
        writer.flush()?;

        let (buffered, hash, size) = writer.finish();
        let staged = buffered.into_inner().map_err(|e| e.into_error())?;
        staged.as_file().sync_all()?;

        let location = BlobLocation::for_hash(&hash);
        let target = self.path_of(&location);

        if target.is_file() {
            debug!(%location, size, "dedup hit, discarding staged copy");
            return Ok(StoredBlob {
                hash,
                size,
                location,
                deduplicated: true,
            });
        }

        let created = self.promote(staged, &target)?;
        if created {
            debug!(
                %location,
                size,
                filename = hints.filename.as_deref().unwrap_or("-"),
                "blob stored"
            );
        } else {
            debug!(%location, size, "lost promote race, blob already present");
        }
        Ok(StoredBlob {
            hash,
            size,
            location,
            deduplicated: !created,
        })
    }

    fn get(&self, location: &BlobLocation) -> StoreResult<Option<BlobReader>> {
        match File::open(self.path_of(location)) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, location: &BlobLocation) -> StoreResult<bool> {
        match fs::remove_file(self.path_of(location)) {
            Ok(()) => {
                debug!(%location, "blob deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn copy(&self, from: &BlobLocation, to: &BlobLocation) -> StoreResult<bool> {
        let Some(mut source) = self.get(from)? else {
            warn!(%from, "copy source missing");
            return Ok(false);
        };
        let mut staged = self.stage(&PutHints::default())?;
        io::copy(&mut source, &mut staged)?;
        staged.as_file().sync_all()?;

        if self.promote(staged, &self.path_of(to))? {
            debug!(%from, %to, "blob copied");
        } else {
            debug!(%from, %to, "copy target already present, kept");
        }
        Ok(true)
    }

    fn exists(&self, location: &BlobLocation) -> StoreResult<bool> {
        Ok(self.path_of(location).is_file())
    }

    fn size(&self, location: &BlobLocation) -> StoreResult<Option<u64>> {
        match fs::metadata(self.path_of(location)) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn locations(&self) -> StoreResult<Vec<BlobLocation>> {
        let mut locations: Vec<BlobLocation> = self
            .walk_blobs()
            .filter_map(|entry| self.relative_location(entry.path()))
            .collect();
        locations.sort();
        Ok(locations)
    }

    fn stats(&self) -> StoreStats {
        self.walk_blobs()
            .filter_map(|entry| entry.metadata().ok())
            .fold(StoreStats::default(), |mut acc, meta| {
                acc.blob_count += 1;
                acc.total_bytes += meta.len();
                acc
            })
    }
}

impl std::fmt::Debug for FsBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsBlobStore")
            .field("root", &self.config.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_types::ContentHash;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn temp_store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(StoreConfig::at(dir.path())).unwrap();
        (dir, store)
    }

    fn staging_entries(store: &FsBlobStore) -> usize {
        fs::read_dir(&store.staging).unwrap().count()
    }

    // -----------------------------------------------------------------------
    // put / get
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_read_back() {
        let (_dir, store) = temp_store();
        let stored = store
            .put_bytes(b"hello world", &PutHints::new("hello.txt"))
            .unwrap();
        assert_eq!(stored.hash, ContentHash::of(b"hello world"));
        assert_eq!(stored.size, 11);
        assert!(!stored.deduplicated);
        assert!(stored.location.is_canonical_for(&stored.hash));

        let data = store.read_all(&stored.location).unwrap().unwrap();
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn put_empty_stream() {
        let (_dir, store) = temp_store();
        let stored = store.put_bytes(b"", &PutHints::default()).unwrap();
        assert_eq!(stored.size, 0);
        assert_eq!(stored.hash, ContentHash::empty());
        assert_eq!(store.read_all(&stored.location).unwrap().unwrap(), b"");
    }

    #[test]
    fn put_streams_large_content() {
        let (_dir, store) = temp_store();
        let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 253) as u8).collect();
        let stored = store.put(&mut data.as_slice(), &PutHints::default()).unwrap();
        assert_eq!(stored.size, data.len() as u64);
        assert_eq!(store.read_all(&stored.location).unwrap().unwrap(), data);
    }

    #[test]
    fn blob_lands_in_bucketed_path() {
        let (dir, store) = temp_store();
        let stored = store.put_bytes(b"bucket", &PutHints::default()).unwrap();
        let hex = stored.hash.to_hex();
        let expected = dir
            .path()
            .join("objects")
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(&hex);
        assert!(expected.is_file());
    }

    #[test]
    fn get_missing_returns_none() {
        let (_dir, store) = temp_store();
        let loc = BlobLocation::for_hash(&ContentHash::of(b"never written"));
        assert!(store.get(&loc).unwrap().is_none());
        assert!(store.read_all(&loc).unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Deduplication
    // -----------------------------------------------------------------------

    #[test]
    fn identical_content_is_stored_once() {
        let (_dir, store) = temp_store();
        let first = store.put_bytes(b"same bytes", &PutHints::new("a.txt")).unwrap();
        let second = store.put_bytes(b"same bytes", &PutHints::new("b.txt")).unwrap();
        assert_eq!(first.hash, second.hash);
        assert_eq!(first.location, second.location);
        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(store.stats().blob_count, 1);
        assert_eq!(staging_entries(&store), 0);
    }

    #[test]
    fn concurrent_identical_puts_converge() {
        let (_dir, store) = temp_store();
        let store = Arc::new(store);
        let payload: Vec<u8> = b"contended content ".repeat(4096);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let payload = payload.clone();
                thread::spawn(move || store.put_bytes(&payload, &PutHints::default()).unwrap())
            })
            .collect();
        let results: Vec<StoredBlob> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();

        let created = results.iter().filter(|r| !r.deduplicated).count();
        assert_eq!(created, 1);
        assert!(results.windows(2).all(|w| w[0].location == w[1].location));
        assert_eq!(store.stats().blob_count, 1);
        assert_eq!(store.read_all(&results[0].location).unwrap().unwrap(), payload);
        assert_eq!(staging_entries(&store), 0);
    }

    // -----------------------------------------------------------------------
    // Failure handling
    // -----------------------------------------------------------------------

    struct FailingReader {
        sent: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"));
            }
            self.sent = true;
            let chunk = b"partial upload";
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn failed_stream_leaves_nothing_visible() {
        let (_dir, store) = temp_store();
        let err = store
            .put(&mut FailingReader { sent: false }, &PutHints::default())
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.stats().blob_count, 0);
        assert_eq!(staging_entries(&store), 0);
    }

    #[test]
    fn oversized_put_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            max_blob_size: Some(4),
            ..StoreConfig::at(dir.path())
        };
        let store = FsBlobStore::open(config).unwrap();
        let err = store.put_bytes(b"12345", &PutHints::default()).unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { limit: 4 }));
        assert_eq!(store.stats().blob_count, 0);
        assert_eq!(staging_entries(&store), 0);
        assert!(store.put_bytes(b"1234", &PutHints::default()).is_ok());
    }

    // -----------------------------------------------------------------------
    // delete / exists / copy / verify
    // -----------------------------------------------------------------------

    #[test]
    fn delete_then_exists() {
        let (_dir, store) = temp_store();
        let stored = store.put_bytes(b"to-delete", &PutHints::default()).unwrap();
        assert!(store.exists(&stored.location).unwrap());
        assert_eq!(store.size(&stored.location).unwrap(), Some(9));
        assert!(store.delete(&stored.location).unwrap());
        assert_eq!(store.size(&stored.location).unwrap(), None);
        assert!(!store.exists(&stored.location).unwrap());
        assert!(!store.delete(&stored.location).unwrap());
    }

    #[test]
    fn copy_to_new_location() {
        let (_dir, store) = temp_store();
        let stored = store.put_bytes(b"copy me", &PutHints::default()).unwrap();
        let target = BlobLocation::parse("backup/copy-me").unwrap();
        assert!(store.copy(&stored.location, &target).unwrap());
        assert_eq!(store.read_all(&target).unwrap().unwrap(), b"copy me");
        assert!(store.verify(&target, &stored.hash).unwrap());
    }

    #[test]
    fn copy_never_replaces_existing_blob() {
        let (_dir, store) = temp_store();
        let original = store.put_bytes(b"canonical", &PutHints::default()).unwrap();
        let other = store.put_bytes(b"intruder", &PutHints::default()).unwrap();

        assert!(store.copy(&other.location, &original.location).unwrap());
        assert_eq!(store.read_all(&original.location).unwrap().unwrap(), b"canonical");
        assert!(store.verify(&original.location, &original.hash).unwrap());
        assert!(fs::read_dir(store.root().join("staging")).unwrap().next().is_none());
    }

    #[test]
    fn copy_missing_source_returns_false() {
        let (_dir, store) = temp_store();
        let from = BlobLocation::parse("nope").unwrap();
        let to = BlobLocation::parse("also-nope").unwrap();
        assert!(!store.copy(&from, &to).unwrap());
        assert!(!store.exists(&to).unwrap());
    }

    #[test]
    fn verify_detects_corruption() {
        let (_dir, store) = temp_store();
        let stored = store.put_bytes(b"pristine", &PutHints::default()).unwrap();
        assert!(store.verify(&stored.location, &stored.hash).unwrap());

        fs::write(store.path_of(&stored.location), b"tampered").unwrap();
        assert!(!store.verify(&stored.location, &stored.hash).unwrap());
        // Never repaired.
        assert_eq!(store.read_all(&stored.location).unwrap().unwrap(), b"tampered");
    }

    #[test]
    fn verify_missing_is_false() {
        let (_dir, store) = temp_store();
        let hash = ContentHash::of(b"ghost");
        assert!(!store.verify(&BlobLocation::for_hash(&hash), &hash).unwrap());
    }

    // -----------------------------------------------------------------------
    // listing / stats / staging cleanup
    // -----------------------------------------------------------------------

    #[test]
    fn locations_lists_every_blob() {
        let (_dir, store) = temp_store();
        let a = store.put_bytes(b"aaa", &PutHints::default()).unwrap();
        let b = store.put_bytes(b"bbb", &PutHints::default()).unwrap();
        let locations = store.locations().unwrap();
        assert_eq!(locations.len(), 2);
        assert!(locations.contains(&a.location));
        assert!(locations.contains(&b.location));
    }

    #[test]
    fn stats_sum_sizes() {
        let (_dir, store) = temp_store();
        store.put_bytes(b"12345", &PutHints::default()).unwrap();
        store.put_bytes(b"123456789", &PutHints::default()).unwrap();
        let stats = store.stats();
        assert_eq!(stats.blob_count, 2);
        assert_eq!(stats.total_bytes, 14);
    }

    #[test]
    fn cleanup_staging_removes_only_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            staging_max_age: Duration::ZERO,
            ..StoreConfig::at(dir.path())
        };
        let store = FsBlobStore::open(config).unwrap();
        fs::write(store.staging.join("abandoned.tmp"), b"leftover").unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(store.cleanup_staging().unwrap(), 1);
        assert_eq!(staging_entries(&store), 0);

        let (_dir, fresh) = temp_store();
        fs::write(fresh.staging.join("recent.tmp"), b"in flight").unwrap();
        assert_eq!(fresh.cleanup_staging().unwrap(), 0);
    }

    #[test]
    fn reopen_sees_existing_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let stored = {
            let store = FsBlobStore::open(StoreConfig::at(dir.path())).unwrap();
            store.put_bytes(b"durable", &PutHints::default()).unwrap()
        };
        let store = FsBlobStore::open(StoreConfig::at(dir.path())).unwrap();
        assert!(store.exists(&stored.location).unwrap());
        let again = store.put_bytes(b"durable", &PutHints::default()).unwrap();
        assert!(again.deduplicated);
    }
}
