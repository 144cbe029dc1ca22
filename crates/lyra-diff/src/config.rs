use serde::{Deserialize, Serialize};

use crate::text::{DEFAULT_CONTEXT, DEFAULT_SIMILARITY_LIMIT};

/// Tuning for text comparisons.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Unchanged lines shown around each hunk.
    pub context_lines: usize,
    /// Texts longer than this many characters get a line-based similarity
    /// instead of a character edit distance.
    pub similarity_char_limit: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT,
            similarity_char_limit: DEFAULT_SIMILARITY_LIMIT,
        }
    }
}
