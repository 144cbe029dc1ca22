use lyra_version::{format_size, Version};
use serde::{Deserialize, Serialize};

/// How a version's content relates to its predecessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Modified,
    Grown,
    Shrunk,
}

impl ChangeType {
    /// Classify by size alone; equal sizes count as a modification.
    pub fn between(previous: &Version, current: &Version) -> Self {
        match current.size.cmp(&previous.size) {
            std::cmp::Ordering::Greater => Self::Grown,
            std::cmp::Ordering::Less => Self::Shrunk,
            std::cmp::Ordering::Equal => Self::Modified,
        }
    }
}

/// One row of a file's change history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub version: Version,
    pub change_type: ChangeType,
    pub summary: String,
    /// Signed byte delta from the previous version.
    pub size_change: i64,
    /// Similarity to the previous version; `0.0` for the first.
    pub similarity: f64,
}

impl HistoryEntry {
    pub(crate) fn created(version: &Version) -> Self {
        Self {
            change_type: ChangeType::Created,
            summary: format!("Created ({}): {}", version.human_size(), comment_of(version)),
            size_change: version.size as i64,
            similarity: 0.0,
            version: version.clone(),
        }
    }

    pub(crate) fn describe(version: &Version, previous: &Version) -> String {
        let delta = version.size as i64 - previous.size as i64;
        let sign = if delta < 0 { "-" } else { "+" };
        format!(
            "{sign}{}: {}",
            format_size(delta.unsigned_abs()),
            comment_of(version)
        )
    }
}

fn comment_of(version: &Version) -> &str {
    match version.comment.as_deref() {
        Some(c) if !c.trim().is_empty() => c,
        _ => "No comment",
    }
}
