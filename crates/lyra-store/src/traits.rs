use std::io::Read;

use lyra_crypto::ContentHasher;
use lyra_types::{BlobLocation, ContentHash};
use tracing::warn;

use crate::blob::{BlobReader, PutHints, StoreStats, StoredBlob};
use crate::error::StoreResult;

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - `put` of bytes already present stores nothing and returns the existing
///   location with `deduplicated = true`.
/// - A blob is never visible under its final location until fully written.
/// - Concurrent `put`s of identical content must not corrupt the store.
/// - The store never tracks references; `delete` removes bytes
///   unconditionally.
/// - Not-found is `Ok(None)` / `Ok(false)`, never an error.
pub trait BlobStore: Send + Sync {
    /// Stream content into the store.
    ///
    /// Returns `Err` on I/O failure, in which case no partial blob is
    /// visible and the write may be retried.
    fn put(&self, reader: &mut dyn Read, hints: &PutHints) -> StoreResult<StoredBlob>;

    /// Open a blob for reading. Returns `Ok(None)` if it does not exist.
    fn get(&self, location: &BlobLocation) -> StoreResult<Option<BlobReader>>;

    /// Delete a blob. Returns `true` if it existed.
    ///
    /// Deleting a blob that a live version still references corrupts that
    /// version; callers must check references first.
    fn delete(&self, location: &BlobLocation) -> StoreResult<bool>;

    /// Copy a blob to another location. Returns `false` if the source is
    /// missing. An existing destination is never replaced.
    fn copy(&self, from: &BlobLocation, to: &BlobLocation) -> StoreResult<bool>;

    /// Check whether a blob exists.
    fn exists(&self, location: &BlobLocation) -> StoreResult<bool>;

    /// Size of a stored blob in bytes. Returns `Ok(None)` if it does not exist.
    fn size(&self, location: &BlobLocation) -> StoreResult<Option<u64>>;

    /// All blob locations currently stored, sorted.
    fn locations(&self) -> StoreResult<Vec<BlobLocation>>;

    /// Count and total size of stored blobs.
    fn stats(&self) -> StoreStats;

    /// Store an in-memory byte slice.
    fn put_bytes(&self, data: &[u8], hints: &PutHints) -> StoreResult<StoredBlob> {
        let mut reader = data;
        self.put(&mut reader, hints)
    }

    /// Read a blob fully into memory. Returns `Ok(None)` if it does not exist.
    fn read_all(&self, location: &BlobLocation) -> StoreResult<Option<Vec<u8>>> {
        match self.get(location)? {
            Some(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(Some(buf))
            }
            None => Ok(None),
        }
    }

    /// Recompute the hash of stored bytes and compare with `expected`.
    ///
    /// A missing blob or a mismatch yields `Ok(false)`. Mismatches are
    /// logged as data corruption and left untouched.
    fn verify(&self, location: &BlobLocation, expected: &ContentHash) -> StoreResult<bool> {
        let Some(mut reader) = self.get(location)? else {
            warn!(%location, "integrity check on missing blob");
            return Ok(false);
        };
        let (computed, _) = ContentHasher::hash_reader(&mut reader)?;
        if computed != *expected {
            warn!(
                %location,
                expected = %expected,
                computed = %computed,
                "blob integrity mismatch"
            );
            return Ok(false);
        }
        Ok(true)
    }
}
