use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a filesystem blob store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory. Blobs live under `objects/`, staging under `staging/`.
    pub root: PathBuf,
    /// Largest blob accepted by `put`, in bytes. `None` means unlimited.
    pub max_blob_size: Option<u64>,
    /// Staging files older than this are considered abandoned.
    pub staging_max_age: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/blobs"),
            max_blob_size: None,
            staging_max_age: Duration::from_secs(60 * 60),
        }
    }
}

impl StoreConfig {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }
}
