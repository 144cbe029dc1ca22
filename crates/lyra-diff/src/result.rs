use serde::{Deserialize, Serialize};

use crate::classify::DiffKind;

/// Alignment step between old and new line sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOp {
    Equal,
    Insert,
    Delete,
    Replace,
}

/// One aligned line. Line numbers are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub op: DiffOp,
    pub old_line: Option<usize>,
    pub new_line: Option<usize>,
    pub old_text: Option<String>,
    pub new_text: Option<String>,
}

impl DiffLine {
    pub(crate) fn equal(old_line: usize, new_line: usize, text: &str) -> Self {
        Self {
            op: DiffOp::Equal,
            old_line: Some(old_line),
            new_line: Some(new_line),
            old_text: Some(text.to_string()),
            new_text: Some(text.to_string()),
        }
    }

    pub(crate) fn insert(new_line: usize, text: &str) -> Self {
        Self {
            op: DiffOp::Insert,
            old_line: None,
            new_line: Some(new_line),
            old_text: None,
            new_text: Some(text.to_string()),
        }
    }

    pub(crate) fn delete(old_line: usize, text: &str) -> Self {
        Self {
            op: DiffOp::Delete,
            old_line: Some(old_line),
            new_line: None,
            old_text: Some(text.to_string()),
            new_text: None,
        }
    }

    pub(crate) fn replace(old_line: usize, new_line: usize, old: &str, new: &str) -> Self {
        Self {
            op: DiffOp::Replace,
            old_line: Some(old_line),
            new_line: Some(new_line),
            old_text: Some(old.to_string()),
            new_text: Some(new.to_string()),
        }
    }
}

/// Outcome of comparing two contents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub kind: DiffKind,
    /// Aligned lines; empty for binary comparisons.
    pub lines: Vec<DiffLine>,
    /// Unified rendering; empty for binary comparisons.
    pub unified: String,
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub unchanged: usize,
    /// 1.0 for identical content.
    pub similarity: f64,
    /// Human-readable description, set for binary comparisons.
    pub summary: Option<String>,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        self.added + self.deleted + self.modified > 0
    }

    pub fn stats(&self) -> DiffStats {
        DiffStats {
            total: self.added + self.deleted + self.modified + self.unchanged,
            added: self.added,
            deleted: self.deleted,
            modified: self.modified,
            unchanged: self.unchanged,
        }
    }
}

/// Line counts of a diff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub total: usize,
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub unchanged: usize,
}

impl DiffStats {
    /// Fraction of aligned lines that changed.
    pub fn change_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.added + self.deleted + self.modified) as f64 / self.total as f64
        }
    }
}
