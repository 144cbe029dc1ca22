use lyra_version::format_size;

use crate::classify::DiffKind;
use crate::result::DiffResult;

/// Fraction of positions holding the same byte, over the longer length.
///
/// Position-wise only: an insertion near the start makes everything after
/// it look different.
pub fn binary_similarity(old: &[u8], new: &[u8]) -> f64 {
    if old == new {
        return 1.0;
    }
    let longest = old.len().max(new.len());
    let matches = old.iter().zip(new).filter(|(a, b)| a == b).count();
    matches as f64 / longest as f64
}

/// Compare two binary contents.
pub fn diff_binary(old: &[u8], new: &[u8]) -> DiffResult {
    diff_binary_as(old, new, DiffKind::Binary)
}

pub(crate) fn diff_binary_as(old: &[u8], new: &[u8], kind: DiffKind) -> DiffResult {
    let identical = old == new;
    let similarity = binary_similarity(old, new);
    let summary = if identical {
        "Binary content unchanged".to_string()
    } else {
        change_summary(old.len() as u64, new.len() as u64, similarity)
    };

    DiffResult {
        kind,
        lines: Vec::new(),
        unified: String::new(),
        added: 0,
        deleted: 0,
        modified: usize::from(!identical),
        unchanged: 0,
        similarity,
        summary: Some(summary),
    }
}

/// Describe a binary change: size delta, similarity and magnitude.
pub fn change_summary(old_size: u64, new_size: u64, similarity: f64) -> String {
    let size = match new_size.cmp(&old_size) {
        std::cmp::Ordering::Greater => format!("Size increased by {}", format_size(new_size - old_size)),
        std::cmp::Ordering::Less => format!("Size decreased by {}", format_size(old_size - new_size)),
        std::cmp::Ordering::Equal => "Size unchanged".to_string(),
    };
    let magnitude = if similarity >= 0.8 {
        "minor"
    } else if similarity >= 0.5 {
        "moderate"
    } else {
        "major"
    };
    format!("{size}, similarity {:.1}% ({magnitude} change)", similarity * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes() {
        let r = diff_binary(&[1, 2, 3], &[1, 2, 3]);
        assert_eq!(r.similarity, 1.0);
        assert_eq!(r.modified, 0);
        assert!(!r.has_changes());
        assert_eq!(r.summary.as_deref(), Some("Binary content unchanged"));
    }

    #[test]
    fn both_empty_are_identical() {
        assert_eq!(binary_similarity(&[], &[]), 1.0);
    }

    #[test]
    fn positional_matches_over_longest() {
        assert!((binary_similarity(&[1, 2, 3, 4], &[1, 9, 3]) - 0.5).abs() < 1e-9);
        assert_eq!(binary_similarity(&[], &[1]), 0.0);
    }

    #[test]
    fn changed_bytes_count_as_one_modification() {
        let r = diff_binary(&[0; 10], &[0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(r.kind, DiffKind::Binary);
        assert_eq!(r.modified, 1);
        assert!(r.has_changes());
        assert!(r.lines.is_empty());
        assert_eq!(
            r.summary.as_deref(),
            Some("Size unchanged, similarity 90.0% (minor change)")
        );
    }

    #[test]
    fn summary_bands() {
        assert_eq!(
            change_summary(100, 2148, 0.6),
            "Size increased by 2.0 KB, similarity 60.0% (moderate change)"
        );
        assert_eq!(
            change_summary(10, 4, 0.1),
            "Size decreased by 6 B, similarity 10.0% (major change)"
        );
    }

    #[test]
    fn tagged_kind_is_preserved() {
        let r = diff_binary_as(b"a", b"b", DiffKind::Unsupported);
        assert_eq!(r.kind, DiffKind::Unsupported);
    }
}
