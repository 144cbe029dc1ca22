use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::{Arc, RwLock};

use lyra_crypto::HashingReader;
use lyra_types::BlobLocation;
use tracing::debug;

use crate::blob::{BlobReader, PutHints, StoreStats, StoredBlob};
use crate::error::StoreResult;
use crate::traits::BlobStore;

/// In-memory blob store.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock`;
/// the whole input is buffered before it becomes visible, which gives the
/// same no-partial-blob guarantee as the filesystem store's staging area.
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<BlobLocation, Arc<Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Overwrite the bytes at a location, bypassing content addressing.
    ///
    /// Exists so integrity checks can be exercised against corrupted data.
    pub fn corrupt(&self, location: &BlobLocation, data: Vec<u8>) {
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(location.clone(), Arc::new(data));
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, reader: &mut dyn Read, hints: &PutHints) -> StoreResult<StoredBlob> {
        let mut hashing = HashingReader::new(reader);
        let mut data = Vec::new();
        hashing.read_to_end(&mut data)?;
        let (hash, size) = hashing.finish();
        let location = BlobLocation::for_hash(&hash);

        let mut map = self.blobs.write().expect("lock poisoned");
        let deduplicated = map.contains_key(&location);
        if !deduplicated {
            map.insert(location.clone(), Arc::new(data));
            debug!(
                %location,
                size,
                filename = hints.filename.as_deref().unwrap_or("-"),
                "blob stored"
            );
        }
        Ok(StoredBlob {
            hash,
            size,
            location,
            deduplicated,
        })
    }

    fn get(&self, location: &BlobLocation) -> StoreResult<Option<BlobReader>> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(location).map(|data| {
            let reader: BlobReader = Box::new(Cursor::new(data.as_ref().clone()));
            reader
        }))
    }

    fn delete(&self, location: &BlobLocation) -> StoreResult<bool> {
        let mut map = self.blobs.write().expect("lock poisoned");
        Ok(map.remove(location).is_some())
    }

    fn copy(&self, from: &BlobLocation, to: &BlobLocation) -> StoreResult<bool> {
        let mut map = self.blobs.write().expect("lock poisoned");
        let Some(data) = map.get(from).cloned() else {
            return Ok(false);
        };
        map.entry(to.clone()).or_insert(data);
        Ok(true)
    }

    fn exists(&self, location: &BlobLocation) -> StoreResult<bool> {
        Ok(self.blobs.read().expect("lock poisoned").contains_key(location))
    }

    fn size(&self, location: &BlobLocation) -> StoreResult<Option<u64>> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(location).map(|d| d.len() as u64))
    }

    fn locations(&self) -> StoreResult<Vec<BlobLocation>> {
        Ok(self
            .blobs
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect())
    }

    fn stats(&self) -> StoreStats {
        let map = self.blobs.read().expect("lock poisoned");
        StoreStats {
            blob_count: map.len() as u64,
            total_bytes: map.values().map(|d| d.len() as u64).sum(),
        }
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}
