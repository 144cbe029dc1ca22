use std::path::{Path, PathBuf};
use std::time::Duration;

use lyra_diff::DiffConfig;
use lyra_retention::RetentionPolicy;
use lyra_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Top-level configuration of a [`crate::Vault`].
///
/// ```toml
/// cleanup_interval_secs = 3600
/// records_path = "/srv/lyra/records.json"
/// catalog_path = "/srv/lyra/catalog.json"
///
/// [store]
/// root = "/srv/lyra/blobs"
///
/// [retention]
/// strategy = "keep_count"
/// keep_count = 5
///
/// [diff]
/// context_lines = 3
/// similarity_char_limit = 20000
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Keep blobs in memory instead of under `store.root`.
    pub in_memory: bool,
    pub store: StoreConfig,
    /// JSON snapshot of version records. `None` keeps records in memory.
    pub records_path: Option<PathBuf>,
    /// JSON snapshot of the file catalog. `None` keeps it in memory.
    pub catalog_path: Option<PathBuf>,
    /// Policy used by scheduled and default cleanups.
    pub retention: RetentionPolicy,
    #[serde(rename = "cleanup_interval_secs", with = "secs")]
    pub cleanup_interval: Duration,
    pub diff: DiffConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            in_memory: false,
            store: StoreConfig::default(),
            records_path: None,
            catalog_path: None,
            retention: RetentionPolicy::default(),
            cleanup_interval: Duration::from_secs(60 * 60),
            diff: DiffConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Everything in memory. Nothing survives the process.
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            ..Default::default()
        }
    }

    /// Blobs, records and catalog all under one directory.
    pub fn at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            store: StoreConfig::at(root.join("blobs")),
            records_path: Some(root.join("records.json")),
            catalog_path: Some(root.join("catalog.json")),
            ..Default::default()
        }
    }

    pub fn from_toml_str(input: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.cleanup_interval.is_zero() {
            return Err(SdkError::Config(
                "cleanup_interval_secs must be greater than zero".into(),
            ));
        }
        self.retention.validate()?;
        Ok(())
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
