use chrono::{DateTime, Utc};
use lyra_types::{BlobLocation, ContentHash, FileId, VersionId};
use serde::{Deserialize, Serialize};

/// An immutable snapshot of a file's content at one point in history.
///
/// Once created, a version is never modified. Numbers start at 1 and are
/// strictly increasing per file; retention may leave gaps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub file_id: FileId,
    pub number: u64,
    pub hash: ContentHash,
    pub location: BlobLocation,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub comment: Option<String>,
}

impl Version {
    pub fn is_first(&self) -> bool {
        self.number == 1
    }

    pub fn has_comment(&self) -> bool {
        self.comment.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    /// Size rendered with a binary unit, e.g. `"1.5 KB"`.
    pub fn human_size(&self) -> String {
        format_size(self.size)
    }

    /// Whether two versions carry byte-identical content.
    pub fn same_content(&self, other: &Version) -> bool {
        self.hash == other.hash
    }

    /// One-line description of how this version differs in size from `previous`.
    pub fn change_summary(&self, previous: Option<&Version>) -> String {
        let Some(previous) = previous else {
            return "Initial version".to_string();
        };
        if self.same_content(previous) {
            return "No content change".to_string();
        }
        let delta = self.size as i128 - previous.size as i128;
        match delta.signum() {
            1 => format!("Size increased by {}", format_size(delta.unsigned_abs() as u64)),
            -1 => format!("Size decreased by {}", format_size(delta.unsigned_abs() as u64)),
            _ => "Content changed, size unchanged".to_string(),
        }
    }
}

/// Render a byte count with a binary unit.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Naming and type information the file catalog holds for a file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub mime_type: Option<String>,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// The content a file currently presents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentContent {
    pub version_number: u64,
    pub hash: ContentHash,
    pub location: BlobLocation,
    pub size: u64,
}

impl From<&Version> for CurrentContent {
    fn from(v: &Version) -> Self {
        Self {
            version_number: v.number,
            hash: v.hash,
            location: v.location.clone(),
            size: v.size,
        }
    }
}

/// Ordering for version listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrder {
    #[default]
    Ascending,
    Descending,
}

/// One page of a file's versions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPage {
    pub items: Vec<Version>,
    /// Zero-based page index.
    pub page: usize,
    pub per_page: usize,
    /// Versions across all pages.
    pub total: u64,
}

impl VersionPage {
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page as u64)
    }

    pub fn has_next(&self) -> bool {
        (self.page as u64) + 1 < self.total_pages()
    }
}

/// How a rollback is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackMode {
    /// Append a new version whose content is the target's.
    #[default]
    NewVersion,
    /// Repoint the file's current content at the target without new history.
    InPlace,
}

/// Aggregate figures over one file's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionStatistics {
    pub file_id: FileId,
    pub total_versions: u64,
    pub total_bytes: u64,
    pub max_version_number: Option<u64>,
    pub first_created_at: Option<DateTime<Utc>>,
    pub last_created_at: Option<DateTime<Utc>>,
    pub average_size: u64,
    /// Bytes counting each distinct content hash once.
    pub unique_bytes: u64,
    /// `unique_bytes / total_bytes`; 1.0 for an empty history.
    pub dedup_ratio: f64,
}

impl VersionStatistics {
    /// Compute statistics over a version list.
    pub fn from_versions(file_id: FileId, versions: &[Version]) -> Self {
        let total_versions = versions.len() as u64;
        let total_bytes: u64 = versions.iter().map(|v| v.size).sum();

        let mut seen = std::collections::HashSet::new();
        let unique_bytes: u64 = versions
            .iter()
            .filter(|v| seen.insert(v.hash))
            .map(|v| v.size)
            .sum();

        Self {
            file_id,
            total_versions,
            total_bytes,
            max_version_number: versions.iter().map(|v| v.number).max(),
            first_created_at: versions.iter().map(|v| v.created_at).min(),
            last_created_at: versions.iter().map(|v| v.created_at).max(),
            average_size: total_bytes.checked_div(total_versions).unwrap_or(0),
            unique_bytes,
            dedup_ratio: if total_bytes == 0 {
                1.0
            } else {
                unique_bytes as f64 / total_bytes as f64
            },
        }
    }
}
