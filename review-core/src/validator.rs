//! Comment Validator (§4.5): a deterministic filter on AI-produced
//! `InlineComment`s against the actual `FileChange` set.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{FileChange, InlineComment, LineRange};

/// Diagnostic counters produced alongside the filtered comment list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationCounters {
    pub dropped_unknown_path: usize,
    pub dropped_out_of_region: usize,
    pub dropped_l1_marker: usize,
    pub dropped_false_positive: usize,
}

const PROXIMITY_TOLERANCE: usize = 5;
const DENSITY_WINDOW: usize = 25;
const DENSITY_THRESHOLD: f64 = 0.40;

const FALSE_POSITIVE_PHRASES: &[&str] = &[
    "not defined",
    "is not defined",
    "not found",
    "not implemented",
    "missing definition",
    "missing implementation",
    "ensure it is implemented",
];

fn backtick_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([A-Za-z_][A-Za-z0-9_]*)`").unwrap())
}

fn noun_phrase_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:method|class|function|property|variable|interface)\s+([A-Za-z_][A-Za-z0-9_]*)")
            .unwrap()
    })
}

/// Runs the full pipeline (§4.5 steps 1-6) and returns the surviving
/// comments plus diagnostic counters.
pub fn validate(
    comments: Vec<InlineComment>,
    files: &[FileChange],
) -> (Vec<InlineComment>, ValidationCounters) {
    let by_path: HashMap<&str, &FileChange> = files.iter().map(|f| (f.path.as_str(), f)).collect();
    let mut counters = ValidationCounters::default();
    let mut survivors = Vec::with_capacity(comments.len());

    for mut comment in comments {
        let Some(file) = by_path.get(comment.path.as_str()).copied() else {
            counters.dropped_unknown_path += 1;
            continue;
        };

        resolve_snippet(&mut comment, file);
        clamp(&mut comment, file);

        if !file.changed_line_ranges.is_empty() && !passes_changed_region_gate(&comment, file) {
            counters.dropped_out_of_region += 1;
            continue;
        }

        if comment.start_line == 1 && comment.end_line == 1 {
            counters.dropped_l1_marker += 1;
            continue;
        }

        if is_false_positive(&comment, file) {
            counters.dropped_false_positive += 1;
            continue;
        }

        survivors.push(comment);
    }

    (survivors, counters)
}

/// Step 2: snippet resolution.
fn resolve_snippet(comment: &mut InlineComment, file: &FileChange) {
    let Some(snippet) = comment.code_snippet.as_deref().filter(|s| !s.is_empty()) else {
        return;
    };
    let Some(content) = file.modified_content.as_deref() else {
        return;
    };
    let snippet_first_line = snippet.lines().next().unwrap_or("");
    if snippet_first_line.is_empty() {
        return;
    }
    let snippet_line_count = snippet.lines().count().max(1);
    let content_lines: Vec<&str> = content.lines().collect();
    let total_lines = content_lines.len();

    let hit = content_lines
        .iter()
        .position(|l| *l == snippet_first_line)
        .or_else(|| {
            content_lines
                .iter()
                .position(|l| l.eq_ignore_ascii_case(snippet_first_line))
        });

    if let Some(idx) = hit {
        let start = idx + 1;
        let end = (start + snippet_line_count - 1).min(total_lines.max(start));
        comment.start_line = start;
        comment.end_line = end;
    }
}

/// Step 3: clamp to the file's bounds.
fn clamp(comment: &mut InlineComment, file: &FileChange) {
    let total_lines = file.total_lines().max(1);
    comment.start_line = comment.start_line.clamp(1, total_lines);
    comment.end_line = comment.end_line.clamp(comment.start_line, total_lines);
}

/// Step 4: changed-region gate (proximity OR density).
fn passes_changed_region_gate(comment: &InlineComment, file: &FileChange) -> bool {
    let range = comment.line_range();

    let proximity_hit = file
        .changed_line_ranges
        .iter()
        .any(|r| range.within(r, PROXIMITY_TOLERANCE));
    if proximity_hit {
        return true;
    }

    let window_start = range.start.saturating_sub(DENSITY_WINDOW).max(1);
    let window_end = range.end.saturating_add(DENSITY_WINDOW);
    let window = LineRange::new(window_start, window_end);
    let window_len = (window.end - window.start + 1) as f64;
    if window_len <= 0.0 {
        return false;
    }

    let covered: usize = file
        .changed_line_ranges
        .iter()
        .map(|r| overlap_len(&window, r))
        .sum();
    (covered as f64 / window_len) >= DENSITY_THRESHOLD
}

fn overlap_len(a: &LineRange, b: &LineRange) -> usize {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    if start > end {
        0
    } else {
        end - start + 1
    }
}

/// Step 6: false-positive gate.
fn is_false_positive(comment: &InlineComment, file: &FileChange) -> bool {
    let lower = comment.comment.to_lowercase();
    let matched_phrase = FALSE_POSITIVE_PHRASES.iter().any(|p| lower.contains(p));
    if !matched_phrase {
        return false;
    }

    let Some(content) = file.modified_content.as_deref() else {
        return false;
    };

    let mut identifiers: Vec<String> = backtick_re()
        .captures_iter(&comment.comment)
        .map(|c| c[1].to_string())
        .collect();
    identifiers.extend(
        noun_phrase_re()
            .captures_iter(&comment.comment)
            .map(|c| c[1].to_string()),
    );

    identifiers.iter().any(|ident| content_contains_word(content, ident))
}

fn content_contains_word(content: &str, word: &str) -> bool {
    content.split(|c: char| !c.is_alphanumeric() && c != '_').any(|tok| tok == word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeType, CommentStatus, LeadIn};

    fn file(path: &str, content: &str, ranges: Vec<(usize, usize)>) -> FileChange {
        FileChange {
            path: path.to_string(),
            change_type: ChangeType::Edit,
            original_content: Some(String::new()),
            modified_content: Some(content.to_string()),
            unified_diff: None,
            changed_line_ranges: ranges.into_iter().map(|(s, e)| LineRange::new(s, e)).collect(),
        }
    }

    fn comment(path: &str, start: usize, end: usize, text: &str) -> InlineComment {
        InlineComment {
            path: path.to_string(),
            start_line: start,
            end_line: end,
            lead_in: LeadIn::Concern,
            comment: text.to_string(),
            code_snippet: None,
            status: CommentStatus::Active,
        }
    }

    #[test]
    fn drops_comment_on_unknown_path() {
        let files = vec![file("a.rs", "x\ny\n", vec![(1, 2)])];
        let (survivors, counters) = validate(vec![comment("b.rs", 1, 1, "hi")], &files);
        assert!(survivors.is_empty());
        assert_eq!(counters.dropped_unknown_path, 1);
    }

    #[test]
    fn drops_l1_marker_comments() {
        let files = vec![file("a.rs", "x\ny\nz\n", vec![(1, 3)])];
        let (survivors, counters) = validate(vec![comment("a.rs", 1, 1, "generic note")], &files);
        assert!(survivors.is_empty());
        assert_eq!(counters.dropped_l1_marker, 1);
    }

    #[test]
    fn proximity_keeps_comment_near_changed_range() {
        let content = (1..=20).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let files = vec![file("a.rs", &content, vec![(10, 10)])];
        let (survivors, _) = validate(vec![comment("a.rs", 13, 13, "concern")], &files);
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn drops_comment_far_from_any_changed_range() {
        let content = (1..=200).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let files = vec![file("a.rs", &content, vec![(10, 10)])];
        let (survivors, counters) = validate(vec![comment("a.rs", 190, 190, "concern")], &files);
        assert!(survivors.is_empty());
        assert_eq!(counters.dropped_out_of_region, 1);
    }

    #[test]
    fn false_positive_gate_drops_when_symbol_exists() {
        let content = "fn helper() {}\nfn main() { helper(); }\n";
        let files = vec![file("a.rs", content, vec![(1, 2)])];
        let (survivors, counters) =
            validate(vec![comment("a.rs", 2, 2, "`helper` is not defined")], &files);
        assert!(survivors.is_empty());
        assert_eq!(counters.dropped_false_positive, 1);
    }

    #[test]
    fn false_positive_gate_keeps_when_symbol_absent() {
        let content = "fn main() {\n    other();\n}\n";
        let files = vec![file("a.rs", content, vec![(1, 3)])];
        let (survivors, _) = validate(vec![comment("a.rs", 2, 2, "`missingFn` is not defined")], &files);
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn snippet_resolution_rebinds_lines() {
        let content = "a\nb\nfn target() {\n  body\n}\nc\n";
        let files = vec![file("a.rs", content, vec![(3, 5)])];
        let mut c = comment("a.rs", 1, 1, "should be on the fn");
        c.code_snippet = Some("fn target() {\n  body\n}".to_string());
        let (survivors, _) = validate(vec![c], &files);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].start_line, 3);
    }
}
