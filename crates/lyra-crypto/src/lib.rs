//! Hashing primitives for Lyra Vault.
//!
//! Provides incremental SHA-256 content hashing over byte streams, plus
//! `Read`/`Write` adapters that hash data as it passes through so that a
//! blob can be staged and identified in a single pass.
//!
//! All crypto operations wrap the `sha2` crate; no custom cryptography.

pub mod hasher;
pub mod stream;

pub use hasher::ContentHasher;
pub use stream::{HashingReader, HashingWriter};
