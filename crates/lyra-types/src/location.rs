use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::ContentHash;

/// Relative storage path of a blob inside a blob store.
///
/// Canonical locations are derived from the content hash with two levels of
/// hash-prefix bucketing (`ab/cd/abcd…`) to bound directory fan-out. Callers
/// may also hold non-canonical locations (for example the target of a
/// `copy`), so a location is validated rather than recomputed: it must be a
/// non-empty relative path with no `..`, root or prefix components.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobLocation(String);

impl BlobLocation {
    /// Number of hex characters per bucket level.
    pub const BUCKET_WIDTH: usize = 2;
    /// Number of bucket levels above the blob file.
    pub const BUCKET_DEPTH: usize = 2;

    /// Derive the canonical location for a content hash.
    pub fn for_hash(hash: &ContentHash) -> Self {
        let hex = hash.to_hex();
        let mut path = String::with_capacity(hex.len() + Self::BUCKET_DEPTH * 3);
        for level in 0..Self::BUCKET_DEPTH {
            let start = level * Self::BUCKET_WIDTH;
            path.push_str(&hex[start..start + Self::BUCKET_WIDTH]);
            path.push('/');
        }
        path.push_str(&hex);
        Self(path)
    }

    /// Parse and validate a caller-supplied location.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TypeError> {
        let raw = raw.into();
        validate(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The location as a relative filesystem path.
    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }

    /// Returns `true` if this is the canonical location of `hash`.
    pub fn is_canonical_for(&self, hash: &ContentHash) -> bool {
        *self == Self::for_hash(hash)
    }
}

fn validate(raw: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidLocation {
        location: raw.to_string(),
        reason: reason.to_string(),
    };
    if raw.trim().is_empty() {
        return Err(invalid("empty location"));
    }
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => return Err(invalid("'.' component")),
            Component::ParentDir => return Err(invalid("'..' component")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("absolute location"))
            }
        }
    }
    Ok(())
}

impl fmt::Debug for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobLocation({})", self.0)
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BlobLocation {
    type Error = TypeError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<BlobLocation> for String {
    fn from(location: BlobLocation) -> Self {
        location.0
    }
}
