//! Line-level text diff.
//!
//! Alignment is a greedy walk with a bounded lookahead rather than a minimal
//! edit script. On a mismatch, the old line is searched for in the next
//! [`LOOKAHEAD`] new lines (a hit means the new line was inserted), then the
//! new line in the next [`LOOKAHEAD`] old lines (a hit means the old line was
//! deleted). Otherwise the pair is a replacement.

use std::fmt::Write as _;

use crate::classify::DiffKind;
use crate::config::DiffConfig;
use crate::result::{DiffLine, DiffOp, DiffResult};

/// How far ahead a mismatched line is searched for.
pub const LOOKAHEAD: usize = 10;

/// Context lines around each change in unified output.
pub const DEFAULT_CONTEXT: usize = 3;

/// Longest text, in characters, scored by character edit distance.
pub const DEFAULT_SIMILARITY_LIMIT: usize = 20_000;

const DEFAULT_NAME: &str = "file";

/// Diff two texts with default context and file name.
pub fn diff_text(old: &str, new: &str) -> DiffResult {
    diff_text_with_context(old, new, DEFAULT_NAME, DEFAULT_CONTEXT)
}

/// Diff two texts, rendering `context` lines around each change and using
/// `name` in the unified headers.
pub fn diff_text_with_context(old: &str, new: &str, name: &str, context: usize) -> DiffResult {
    let config = DiffConfig {
        context_lines: context,
        ..DiffConfig::default()
    };
    diff_text_with_config(old, new, name, &config)
}

pub fn diff_text_with_config(old: &str, new: &str, name: &str, config: &DiffConfig) -> DiffResult {
    let context = config.context_lines;
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let lines = align(&old_lines, &new_lines);

    let count = |op: DiffOp| lines.iter().filter(|l| l.op == op).count();
    let unified = render_unified(&lines, name, context);

    DiffResult {
        kind: DiffKind::Text,
        added: count(DiffOp::Insert),
        deleted: count(DiffOp::Delete),
        modified: count(DiffOp::Replace),
        unchanged: count(DiffOp::Equal),
        similarity: similarity_within(old, new, config.similarity_char_limit),
        unified,
        lines,
        summary: None,
    }
}

/// Align two line sequences.
pub fn align(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let (mut oi, mut ni) = (0, 0);

    while oi < old.len() || ni < new.len() {
        if oi >= old.len() {
            out.push(DiffLine::insert(ni + 1, new[ni]));
            ni += 1;
        } else if ni >= new.len() {
            out.push(DiffLine::delete(oi + 1, old[oi]));
            oi += 1;
        } else if old[oi] == new[ni] {
            out.push(DiffLine::equal(oi + 1, ni + 1, old[oi]));
            oi += 1;
            ni += 1;
        } else if appears_within(new, ni, old[oi]) {
            out.push(DiffLine::insert(ni + 1, new[ni]));
            ni += 1;
        } else if appears_within(old, oi, new[ni]) {
            out.push(DiffLine::delete(oi + 1, old[oi]));
            oi += 1;
        } else {
            out.push(DiffLine::replace(oi + 1, ni + 1, old[oi], new[ni]));
            oi += 1;
            ni += 1;
        }
    }
    out
}

fn appears_within(lines: &[&str], start: usize, target: &str) -> bool {
    let end = lines.len().min(start + LOOKAHEAD);
    lines[start..end].iter().any(|l| *l == target)
}

/// How many old and new lines an aligned line consumes.
fn consumes(op: DiffOp) -> (usize, usize) {
    match op {
        DiffOp::Equal | DiffOp::Replace => (1, 1),
        DiffOp::Insert => (0, 1),
        DiffOp::Delete => (1, 0),
    }
}

/// Render aligned lines in unified format.
///
/// Identical inputs produce only the two header lines.
pub fn render_unified(lines: &[DiffLine], name: &str, context: usize) -> String {
    let mut out = format!("--- a/{name}\n+++ b/{name}\n");

    // Old/new offsets before each aligned line.
    let mut offsets = Vec::with_capacity(lines.len());
    let (mut o, mut n) = (0, 0);
    for line in lines {
        offsets.push((o, n));
        let (to, tn) = consumes(line.op);
        o += to;
        n += tn;
    }

    for (start, end) in hunk_ranges(lines, context) {
        let (old_start, new_start) = offsets[start];
        let (old_count, new_count) = lines[start..end]
            .iter()
            .map(|l| consumes(l.op))
            .fold((0, 0), |(a, b), (x, y)| (a + x, b + y));

        let _ = writeln!(
            out,
            "@@ -{},{} +{},{} @@",
            hunk_start(old_start, old_count),
            old_count,
            hunk_start(new_start, new_count),
            new_count
        );
        for line in &lines[start..end] {
            let old = line.old_text.as_deref().unwrap_or_default();
            let new = line.new_text.as_deref().unwrap_or_default();
            match line.op {
                DiffOp::Equal => {
                    let _ = writeln!(out, " {old}");
                }
                DiffOp::Insert => {
                    let _ = writeln!(out, "+{new}");
                }
                DiffOp::Delete => {
                    let _ = writeln!(out, "-{old}");
                }
                DiffOp::Replace => {
                    let _ = writeln!(out, "-{old}");
                    let _ = writeln!(out, "+{new}");
                }
            }
        }
    }
    out
}

// An empty side starts at the line before the hunk.
fn hunk_start(offset: usize, count: usize) -> usize {
    if count == 0 {
        offset
    } else {
        offset + 1
    }
}

/// Half-open index ranges of hunks: each change widened by `context` on both
/// sides, with overlapping or touching ranges merged.
fn hunk_ranges(lines: &[DiffLine], context: usize) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.op == DiffOp::Equal {
            continue;
        }
        let start = i.saturating_sub(context);
        let end = (i + context + 1).min(lines.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

/// Character-level similarity: `1 - edit_distance / max_len`.
pub fn similarity(old: &str, new: &str) -> f64 {
    similarity_within(old, new, DEFAULT_SIMILARITY_LIMIT)
}

/// Like [`similarity`], but texts longer than `limit` characters are scored
/// by aligned lines instead: unchanged lines over the longer line count.
pub fn similarity_within(old: &str, new: &str, limit: usize) -> f64 {
    if old == new {
        return 1.0;
    }
    if old.chars().count().max(new.chars().count()) > limit {
        return line_similarity(old, new);
    }
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(&a, &b) as f64 / longest as f64
}

fn line_similarity(old: &str, new: &str) -> f64 {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let longest = old_lines.len().max(new_lines.len());
    if longest == 0 {
        return 1.0;
    }
    let unchanged = align(&old_lines, &new_lines)
        .iter()
        .filter(|l| l.op == DiffOp::Equal)
        .count();
    unchanged as f64 / longest as f64
}

/// Levenshtein distance with two rolling rows. Cost is `a.len() * b.len()`.
pub fn edit_distance<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, x) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let cost = usize::from(x != y);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(result: &DiffResult) -> Vec<DiffOp> {
        result.lines.iter().map(|l| l.op).collect()
    }

    // -----------------------------------------------------------------------
    // Alignment
    // -----------------------------------------------------------------------

    #[test]
    fn identical_text_is_all_equal() {
        let r = diff_text("a\nb\nc\n", "a\nb\nc\n");
        assert_eq!(ops(&r), vec![DiffOp::Equal; 3]);
        assert!(!r.has_changes());
        assert_eq!(r.similarity, 1.0);
        assert_eq!(r.unified, "--- a/file\n+++ b/file\n");
    }

    #[test]
    fn single_line_replacement() {
        let r = diff_text("hello\n", "world\n");
        assert_eq!(ops(&r), vec![DiffOp::Replace]);
        assert_eq!((r.added, r.deleted, r.modified, r.unchanged), (0, 0, 1, 0));
        assert!(r.similarity > 0.0 && r.similarity < 1.0);
    }

    #[test]
    fn inserted_line_is_detected() {
        let r = diff_text("a\nb\nc", "a\nx\nb\nc");
        assert_eq!(
            ops(&r),
            vec![DiffOp::Equal, DiffOp::Insert, DiffOp::Equal, DiffOp::Equal]
        );
        assert_eq!(r.lines[1].new_line, Some(2));
        assert_eq!(r.lines[1].new_text.as_deref(), Some("x"));
    }

    #[test]
    fn deleted_line_is_detected() {
        let r = diff_text("a\nb\nc", "a\nc");
        assert_eq!(ops(&r), vec![DiffOp::Equal, DiffOp::Delete, DiffOp::Equal]);
        assert_eq!(r.lines[1].old_line, Some(2));
        assert_eq!(r.deleted, 1);
    }

    #[test]
    fn exhausted_side_yields_inserts_or_deletes() {
        let r = diff_text("", "x\ny\n");
        assert_eq!(ops(&r), vec![DiffOp::Insert, DiffOp::Insert]);
        let r = diff_text("x\ny\n", "");
        assert_eq!(ops(&r), vec![DiffOp::Delete, DiffOp::Delete]);
    }

    #[test]
    fn lookahead_is_bounded() {
        // The old first line reappears 11 lines later: beyond the window.
        let old = "target\n";
        let mut new = String::new();
        for i in 0..11 {
            new.push_str(&format!("filler {i}\n"));
        }
        new.push_str("target\n");
        let r = diff_text(old, &new);
        assert_eq!(r.lines[0].op, DiffOp::Replace);
    }

    #[test]
    fn crlf_and_trailing_newline() {
        let r = diff_text("a\r\nb\r\n", "a\nb");
        assert_eq!(ops(&r), vec![DiffOp::Equal, DiffOp::Equal]);
        assert_eq!(diff_text("", "").lines.len(), 0);
    }

    // -----------------------------------------------------------------------
    // Unified rendering
    // -----------------------------------------------------------------------

    #[test]
    fn unified_replace_renders_minus_then_plus() {
        let r = diff_text_with_context("a\nb\nc\n", "a\nB\nc\n", "doc.txt", 3);
        assert_eq!(
            r.unified,
            "--- a/doc.txt\n+++ b/doc.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n"
        );
    }

    #[test]
    fn distant_changes_form_separate_hunks() {
        let old: String = (1..=10).map(|i| format!("l{i}\n")).collect();
        let new = old.replace("l2\n", "L2\n").replace("l9\n", "L9\n");
        let r = diff_text_with_context(&old, &new, "f", 1);
        let headers: Vec<&str> = r.unified.lines().filter(|l| l.starts_with("@@")).collect();
        assert_eq!(headers, vec!["@@ -1,3 +1,3 @@", "@@ -8,3 +8,3 @@"]);
    }

    #[test]
    fn nearby_changes_merge_into_one_hunk() {
        let old: String = (1..=10).map(|i| format!("l{i}\n")).collect();
        let new = old.replace("l3\n", "L3\n").replace("l6\n", "L6\n");
        let r = diff_text_with_context(&old, &new, "f", 2);
        let headers: Vec<&str> = r.unified.lines().filter(|l| l.starts_with("@@")).collect();
        assert_eq!(headers, vec!["@@ -1,8 +1,8 @@"]);
    }

    #[test]
    fn pure_insertion_into_empty_file() {
        let r = diff_text_with_context("", "new\n", "f", 3);
        assert_eq!(r.unified, "--- a/f\n+++ b/f\n@@ -0,0 +1,1 @@\n+new\n");
    }

    #[test]
    fn zero_context_shows_only_changes() {
        let r = diff_text_with_context("a\nb\nc\n", "a\nB\nc\n", "f", 0);
        assert_eq!(r.unified, "--- a/f\n+++ b/f\n@@ -2,1 +2,1 @@\n-b\n+B\n");
    }

    // -----------------------------------------------------------------------
    // Similarity
    // -----------------------------------------------------------------------

    #[test]
    fn edit_distance_basics() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(edit_distance(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(edit_distance(&chars(""), &chars("abc")), 3);
        assert_eq!(edit_distance(&chars("same"), &chars("same")), 0);
    }

    #[test]
    fn long_texts_are_scored_by_lines() {
        let score = similarity_within("a\nb\nc\n", "a\nb\nx\n", 5);
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(similarity_within("same", "same", 0), 1.0);
    }

    #[test]
    fn large_text_diff_stays_line_bound() {
        let old = "line of text\n".repeat(20_000);
        let new = format!("{old}one more\n");
        let r = diff_text(&old, &new);
        assert_eq!(r.added, 1);
        assert!((r.similarity - 20_000.0 / 20_001.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_scales_with_distance() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        assert!((similarity("hello\n", "world\n") - (1.0 - 4.0 / 6.0)).abs() < 1e-9);
    }

    proptest::proptest! {
        #[test]
        fn diff_of_identical_text_has_no_changes(lines in proptest::collection::vec("[a-z ]{0,12}", 0..30)) {
            let text = lines.join("\n");
            let r = diff_text(&text, &text);
            proptest::prop_assert!(!r.has_changes());
            proptest::prop_assert_eq!(r.similarity, 1.0);
            proptest::prop_assert_eq!(r.unchanged, text.lines().count());
        }

        #[test]
        fn alignment_accounts_for_every_line(
            old in proptest::collection::vec("[abc]", 0..20),
            new in proptest::collection::vec("[abc]", 0..20),
        ) {
            let old_refs: Vec<&str> = old.iter().map(String::as_str).collect();
            let new_refs: Vec<&str> = new.iter().map(String::as_str).collect();
            let lines = align(&old_refs, &new_refs);
            let (o, n) = lines
                .iter()
                .map(|l| consumes(l.op))
                .fold((0, 0), |(a, b), (x, y)| (a + x, b + y));
            proptest::prop_assert_eq!(o, old.len());
            proptest::prop_assert_eq!(n, new.len());
        }
    }
}
