//! Rendering helpers for the summary thread and the PR-description history
//! table (§4.6.2 steps 8 and 10, §6 "PR description convention").

use chrono::{DateTime, Utc};

use crate::model::{FileVerdict, ReviewSummary};

pub const HISTORY_START: &str = "<!-- AI-REVIEW-HISTORY-START -->";
pub const HISTORY_END: &str = "<!-- AI-REVIEW-HISTORY-END -->";

const HISTORY_HEADER: &str =
    "| Review # | Date (UTC) | Action | Verdict | Commit | Iteration | Scope |\n|---|---|---|---|---|---|---|";

/// One row appended to the PR-description history table.
pub struct HistoryRow {
    pub review_number: u64,
    pub date_utc: DateTime<Utc>,
    pub action: &'static str,
    pub verdict: String,
    pub commit: String,
    pub iteration: i64,
    pub scope: String,
}

fn short_sha(commit: &str) -> String {
    commit.chars().take(8).collect()
}

impl HistoryRow {
    fn to_markdown_row(&self) -> String {
        format!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            self.review_number,
            self.date_utc.format("%Y-%m-%d %H:%M"),
            self.action,
            self.verdict,
            short_sha(&self.commit),
            self.iteration,
            self.scope,
        )
    }
}

/// Appends `row` to the history block in `description`, creating the block
/// on first write and preserving pre-existing rows across writes.
pub fn append_history_row(description: &str, row: &HistoryRow) -> String {
    let new_row = row.to_markdown_row();

    if let (Some(start), Some(end)) = (description.find(HISTORY_START), description.find(HISTORY_END)) {
        let block_body_start = start + HISTORY_START.len();
        let before = &description[..block_body_start];
        let existing_block = &description[block_body_start..end];
        let after = &description[end..];

        let mut rows: Vec<&str> = existing_block
            .lines()
            .filter(|l| l.trim_start().starts_with('|') && !l.contains("---") && !l.contains("Review #"))
            .collect();
        let owned_new_row = new_row.clone();
        rows.push(&owned_new_row);

        let rebuilt = format!("\n\n{HISTORY_HEADER}\n{}\n\n", rows.join("\n"));
        format!("{before}{rebuilt}{after}")
    } else {
        let block = format!(
            "\n\n{HISTORY_START}\n\n{HISTORY_HEADER}\n{new_row}\n\n{HISTORY_END}\n"
        );
        format!("{}{}", description.trim_end(), block)
    }
}

/// Prior-review context shown in a ReReview's blockquote (§4.6.2 step 8).
pub struct PriorReviewContext {
    pub reviewed_at_utc: DateTime<Utc>,
    pub commit: String,
    pub iteration: i64,
    pub vote: Option<i8>,
    pub was_draft: bool,
}

/// Renders the single top-level summary thread posted in step 8.
pub fn render_summary_thread(
    is_re_review: bool,
    review_number: u64,
    pr_id: i64,
    prior: Option<&PriorReviewContext>,
    summary: &ReviewSummary,
    file_reviews: &[(String, FileVerdict, String)],
) -> String {
    let mut out = String::new();

    let title = if is_re_review { "Re-Review" } else { "Code Review" };
    out.push_str(&format!("## {title} (Review {review_number}) -- PR {pr_id}\n\n"));

    if is_re_review {
        if let Some(p) = prior {
            let vote_desc = match p.vote {
                Some(v) => format!("vote: {v}"),
                None => "no vote".to_string(),
            };
            let draft_badge = if p.was_draft { " (draft)" } else { "" };
            out.push_str(&format!(
                "> Previous review: {} -- commit `{}`{draft_badge}, iteration {}, {vote_desc}\n\n",
                p.reviewed_at_utc.format("%Y-%m-%d %H:%M UTC"),
                short_sha(&p.commit),
                p.iteration,
            ));
        }
    }

    out.push_str("### Summary\n\n");
    out.push_str(&format!(
        "- Files changed: {}\n- Edits: {}\n- Adds: {}\n- Deletes: {}\n\n{}\n\n",
        summary.files_changed,
        summary.edits_count,
        summary.adds_count,
        summary.deletes_count,
        summary.description,
    ));

    let mentioned: Vec<&(String, FileVerdict, String)> = file_reviews
        .iter()
        .filter(|(_, verdict, text)| verdict.warrants_mention() || text.contains("AI review failed"))
        .collect();

    if !mentioned.is_empty() {
        out.push_str("### Code Changes Review\n\n");
        for (path, verdict, text) in mentioned {
            let badge = match verdict {
                FileVerdict::Rejected => "REJECTED",
                FileVerdict::Concern => "CONCERN",
                FileVerdict::Clean => "CLEAN",
            };
            out.push_str(&format!("**{path}** ({badge})\n\n{text}\n\n"));
        }
    }

    out.push_str(&format!(
        "### Verdict: **{}**\n\n{}\n",
        summary.verdict, summary.verdict_justification
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_history_block_on_first_write() {
        let description = "Original PR description.";
        let row = HistoryRow {
            review_number: 1,
            date_utc: Utc::now(),
            action: "Full Review",
            verdict: "APPROVED".into(),
            commit: "abcdef1234567890".into(),
            iteration: 1,
            scope: "3 files".into(),
        };
        let out = append_history_row(description, &row);
        assert!(out.contains(HISTORY_START));
        assert!(out.contains(HISTORY_END));
        assert!(out.contains("| 1 |"));
        assert!(out.contains("abcdef12"));
    }

    #[test]
    fn preserves_prior_rows_on_append() {
        let description = "Desc.";
        let row1 = HistoryRow {
            review_number: 1,
            date_utc: Utc::now(),
            action: "Full Review",
            verdict: "APPROVED".into(),
            commit: "aaaaaaaaaaaa".into(),
            iteration: 1,
            scope: "1 file".into(),
        };
        let once = append_history_row(description, &row1);

        let row2 = HistoryRow {
            review_number: 2,
            date_utc: Utc::now(),
            action: "Re-Review".into(),
            verdict: "NEEDS WORK".into(),
            commit: "bbbbbbbbbbbb".into(),
            iteration: 2,
            scope: "2 files".into(),
        };
        let twice = append_history_row(&once, &row2);

        assert!(twice.contains("| 1 |"));
        assert!(twice.contains("| 2 |"));
        assert!(twice.contains("aaaaaaaa"));
        assert!(twice.contains("bbbbbbbb"));
    }
}
