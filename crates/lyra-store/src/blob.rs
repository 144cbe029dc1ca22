use std::io::Read;

use lyra_types::{BlobLocation, ContentHash};
use serde::{Deserialize, Serialize};

/// Boxed reader over a blob's bytes.
pub type BlobReader = Box<dyn Read + Send>;

/// Optional hints accompanying a `put`.
///
/// Hints never influence where content is stored; they only name the
/// staging file and appear in logs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutHints {
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl PutHints {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sanitized prefix for a staging file name.
    pub(crate) fn staging_prefix(&self) -> String {
        let stem: String = self
            .filename
            .as_deref()
            .unwrap_or("blob")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            .take(32)
            .collect();
        if stem.len() < 3 {
            format!("stage_{stem}")
        } else {
            format!("{stem}.")
        }
    }
}

/// Outcome of a successful `put`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlob {
    pub hash: ContentHash,
    pub size: u64,
    pub location: BlobLocation,
    /// `true` when the content was already present and nothing was written.
    pub deduplicated: bool,
}

/// Aggregate statistics over a store's contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub blob_count: u64,
    pub total_bytes: u64,
}
