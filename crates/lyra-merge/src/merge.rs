use serde::{Deserialize, Serialize};

pub const MARKER_OURS: &str = "<<<<<<< branch1";
pub const MARKER_SEPARATOR: &str = "=======";
pub const MARKER_THEIRS: &str = ">>>>>>> branch2";

/// Result of a three-way merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "content", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// One side's content applies without conflict.
    Clean(String),
    /// Both sides changed; the content carries conflict markers.
    Conflicted(String),
}

impl MergeOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean(_))
    }

    pub fn has_conflicts(&self) -> bool {
        !self.is_clean()
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Clean(c) | Self::Conflicted(c) => c,
        }
    }

    pub fn into_content(self) -> String {
        match self {
            Self::Clean(c) | Self::Conflicted(c) => c,
        }
    }
}

/// Whole-content three-way merge.
///
/// If only one branch diverged from `base`, that branch wins. If both
/// diverged differently, the result wraps both branches in conflict markers.
pub fn three_way_merge(base: &str, branch1: &str, branch2: &str) -> MergeOutcome {
    if branch1 == branch2 || base == branch2 {
        return MergeOutcome::Clean(branch1.to_string());
    }
    if base == branch1 {
        return MergeOutcome::Clean(branch2.to_string());
    }
    MergeOutcome::Conflicted(format!(
        "{MARKER_OURS}\n{branch1}\n{MARKER_SEPARATOR}\n{branch2}\n{MARKER_THEIRS}\n"
    ))
}
