use std::io::{self, Read};

use lyra_types::ContentHash;
use sha2::{Digest, Sha256};

/// Incremental SHA-256 content hasher.
///
/// Bytes are fed with [`update`](Self::update) in any chunking; the final
/// hash is identical to hashing the concatenated stream in one call. The
/// hasher also counts bytes so callers learn the blob size for free.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
    len: u64,
}

impl ContentHasher {
    /// Size of the read buffer used by [`hash_reader`](Self::hash_reader).
    pub const CHUNK_SIZE: usize = 64 * 1024;

    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.len += data.len() as u64;
    }

    /// Number of bytes hashed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if no bytes have been hashed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Consume the hasher and return the content hash and byte count.
    pub fn finalize(self) -> (ContentHash, u64) {
        (ContentHash::from_digest(self.inner.finalize().into()), self.len)
    }

    /// Hash a complete in-memory slice.
    pub fn hash(data: &[u8]) -> ContentHash {
        ContentHash::of(data)
    }

    /// Hash a reader to EOF, returning the hash and total size.
    pub fn hash_reader<R: Read + ?Sized>(reader: &mut R) -> io::Result<(ContentHash, u64)> {
        let mut hasher = Self::new();
        let mut buf = vec![0u8; Self::CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }

    /// Verify that data produces the expected hash.
    pub fn verify(data: &[u8], expected: &ContentHash) -> bool {
        Self::hash(data) == *expected
    }

    /// Verify that a reader's full content produces the expected hash.
    pub fn verify_reader<R: Read + ?Sized>(
        reader: &mut R,
        expected: &ContentHash,
    ) -> io::Result<bool> {
        let (hash, _) = Self::hash_reader(reader)?;
        Ok(hash == *expected)
    }
}
