//! `Read` and `Write` adapters that hash bytes in transit.

use std::io::{self, Read, Write};

use lyra_types::ContentHash;

use crate::hasher::ContentHasher;

/// Writer adapter that hashes everything successfully written through it.
///
/// Only the bytes the inner writer accepted are hashed, so a short write
/// never desynchronizes the hash from the file contents.
pub struct HashingWriter<W> {
    inner: W,
    hasher: ContentHasher,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: ContentHasher::new(),
        }
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.hasher.len()
    }

    /// Return the inner writer together with the hash and size.
    pub fn finish(self) -> (W, ContentHash, u64) {
        let (hash, len) = self.hasher.finalize();
        (self.inner, hash, len)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader adapter that hashes everything read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: ContentHasher,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: ContentHasher::new(),
        }
    }

    /// Bytes read so far.
    pub fn consumed(&self) -> u64 {
        self.hasher.len()
    }

    /// Hash and size of everything read so far.
    pub fn finish(self) -> (ContentHash, u64) {
        self.hasher.finalize()
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
