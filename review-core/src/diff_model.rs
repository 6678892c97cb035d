//! Pure diff utilities: unified-diff production, changed-range extraction,
//! line-numbered rendering (§4.2). No I/O, no state.

use similar::{Algorithm, ChangeTag, TextDiff};

use crate::model::LineRange;

/// Literal text returned by `compute_unified_diff` when inputs are equal.
pub const NO_CHANGES: &str = "(no changes detected)";

/// Above this many original*modified line cells, `similar`'s Myers LCS is
/// abandoned in favor of a naive line-by-line walk (§4.2).
const MAX_LCS_CELLS: u64 = 25_000_000;

fn strip_crlf(s: &str) -> String {
    s.lines().collect::<Vec<_>>().join("\n")
}

/// `computeUnifiedDiff(original, modified, path, context)` (§4.2).
pub fn compute_unified_diff(original: &str, modified: &str, path: &str, context: usize) -> String {
    let original = strip_crlf(original);
    let modified = strip_crlf(modified);

    if original == modified {
        return NO_CHANGES.to_string();
    }

    let orig_lines = original.lines().count() as u64;
    let mod_lines = modified.lines().count() as u64;
    let cells = orig_lines.saturating_mul(mod_lines.max(1));

    let algorithm = if cells > MAX_LCS_CELLS {
        Algorithm::Patience
    } else {
        Algorithm::Myers
    };

    let diff = TextDiff::configure()
        .algorithm(algorithm)
        .newline_terminated(false)
        .diff_lines(&original, &modified);

    render_unified(&diff, path, context, &original, &modified)
}

fn render_unified(
    diff: &TextDiff<'_, '_, '_, str>,
    path: &str,
    context: usize,
    original: &str,
    modified: &str,
) -> String {
    let groups = diff.grouped_ops(context);
    if groups.is_empty() {
        return NO_CHANGES.to_string();
    }

    let orig_lines: Vec<&str> = original.lines().collect();
    let mod_lines: Vec<&str> = modified.lines().collect();

    let mut out = String::new();
    out.push_str(&format!("--- a/{path}\n"));
    out.push_str(&format!("+++ b/{path}\n"));

    for group in &groups {
        let (o_start, o_end, n_start, n_end) = group.iter().fold(
            (usize::MAX, 0usize, usize::MAX, 0usize),
            |(os, oe, ns, ne), op| {
                let r = op.old_range();
                let n = op.new_range();
                (os.min(r.start), oe.max(r.end), ns.min(n.start), ne.max(n.end))
            },
        );
        let o_count = o_end.saturating_sub(o_start);
        let n_count = n_end.saturating_sub(n_start);
        // Hunk headers are 1-based; a zero-length side reports its anchor
        // as the line before which the change would be inserted.
        let o_start_1 = if o_count == 0 { o_start } else { o_start + 1 };
        let n_start_1 = if n_count == 0 { n_start } else { n_start + 1 };
        out.push_str(&format!(
            "@@ -{o_start_1},{o_count} +{n_start_1},{n_count} @@\n"
        ));

        for op in group {
            for change in diff.iter_changes(op) {
                let (sign, text) = match change.tag() {
                    ChangeTag::Delete => ('-', line_at(&orig_lines, change.old_index())),
                    ChangeTag::Insert => ('+', line_at(&mod_lines, change.new_index())),
                    ChangeTag::Equal => (' ', line_at(&orig_lines, change.old_index())),
                };
                out.push(sign);
                out.push_str(text);
                out.push('\n');
            }
        }
    }

    out
}

fn line_at<'a>(lines: &[&'a str], idx: Option<usize>) -> &'a str {
    idx.and_then(|i| lines.get(i).copied()).unwrap_or("")
}

/// `parseChangedLineRanges(unifiedDiff)` (§4.2): extracts the `+` side of
/// each `@@` header. Count `0` is elided. Empty input yields an empty list.
pub fn parse_changed_line_ranges(unified_diff: &str) -> Vec<LineRange> {
    if unified_diff.is_empty() || unified_diff == NO_CHANGES {
        return Vec::new();
    }
    let mut ranges = Vec::new();
    for line in unified_diff.lines() {
        if let Some(header) = line.strip_prefix("@@ ") {
            if let Some((start, count)) = parse_new_side(header) {
                if count == 0 {
                    continue;
                }
                ranges.push(LineRange::new(start, start + count - 1));
            }
        }
    }
    ranges
}

fn parse_new_side(header: &str) -> Option<(usize, usize)> {
    // header looks like "-oStart,oCount +nStart,nCount @@ ..."
    let plus_idx = header.find('+')?;
    let rest = &header[plus_idx + 1..];
    let end = rest.find(' ')?;
    let spec = &rest[..end];
    let mut parts = spec.splitn(2, ',');
    let start: usize = parts.next()?.parse().ok()?;
    let count: usize = match parts.next() {
        Some(c) => c.parse().ok()?,
        None => 1,
    };
    Some((start, count))
}

/// `addLineNumbers(content)` (§4.2): right-justified 1-based line numbers
/// followed by `" | "`.
pub fn add_line_numbers(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let width = lines.len().to_string().len().max(1);
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$} | {}", i + 1, line, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_report_no_changes() {
        let diff = compute_unified_diff("a\nb\nc\n", "a\nb\nc\n", "f.rs", 3);
        assert_eq!(diff, NO_CHANGES);
    }

    #[test]
    fn single_line_edit_produces_one_hunk() {
        let diff = compute_unified_diff("a\nb\nc\n", "a\nX\nc\n", "f.rs", 3);
        assert!(diff.contains("--- a/f.rs"));
        assert!(diff.contains("+++ b/f.rs"));
        assert!(diff.contains("@@ -1,3 +1,3 @@") || diff.contains("@@"));
        assert!(diff.contains("-b"));
        assert!(diff.contains("+X"));
    }

    #[test]
    fn changed_line_ranges_roundtrip_safety() {
        let diff = compute_unified_diff("a\nb\nc\nd\ne\n", "a\nX\nc\nY\ne\n", "f.rs", 3);
        let ranges = parse_changed_line_ranges(&diff);
        assert!(ranges.iter().any(|r| r.contains(2)));
        assert!(ranges.iter().any(|r| r.contains(4)));
    }

    #[test]
    fn empty_diff_yields_empty_ranges() {
        assert!(parse_changed_line_ranges("").is_empty());
        assert!(parse_changed_line_ranges(NO_CHANGES).is_empty());
    }

    #[test]
    fn add_line_numbers_right_justifies() {
        let out = add_line_numbers("one\ntwo\nthree");
        assert_eq!(out, "1 | one\n2 | two\n3 | three");
    }

    #[test]
    fn add_line_numbers_pads_to_max_width() {
        let content = (1..=11).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
        let out = add_line_numbers(&content);
        assert!(out.starts_with(" 1 | l1\n"));
        assert!(out.contains("11 | l11"));
    }
}
