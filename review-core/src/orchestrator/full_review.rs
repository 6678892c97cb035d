//! Shared handler for `FullReview` and `ReReview` (§4.6.2, the 11-step
//! pipeline shared by both actions; they differ only in header text, the
//! prior-review blockquote, and whether step 6 (resolution verification)
//! runs at all).

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::diff_model::add_line_numbers;
use crate::model::{
    FileChange, FileReview, FileVerdict, HistoryAction, LeadIn, PullRequestSnapshot,
    RecommendedVote, ReviewHistoryEntry, ReviewMetadata, ReviewMetrics, ReviewResult,
    ReviewSummary, SeverityBucket, ThreadStatus,
};
use crate::provider::{ProviderPort, ResolutionCandidate};
use crate::state_store::{PostStatus, ReviewStateStore};
use crate::validator;

use super::merge::merge_file_results;
use super::render::{append_history_row, render_summary_thread, HistoryRow, PriorReviewContext};
use super::{classify_store_error, OrchestratorConfig, ReviewedSummary, RunOutcome};

const CONTEXT_MARGIN: usize = 10;

pub async fn handle<S: ReviewStateStore, P: ProviderPort>(
    cfg: &OrchestratorConfig,
    store: &S,
    provider: &P,
    project: &str,
    repo: &str,
    pr: &PullRequestSnapshot,
    metadata: &mut ReviewMetadata,
    is_re_review: bool,
) -> RunOutcome {
    let pr_id = pr.pr_id;

    // Step 1: pre-count existing summary comments; survives a metadata wipe.
    let pre_count = match store.count_summary_comments(project, repo, pr_id).await {
        Ok(n) => n,
        Err(e) => return classify_store_error(e),
    };
    let review_number = pre_count as u64 + 1;

    let history_len = match store.get_history(project, repo, pr_id).await {
        Ok(h) => h.len(),
        Err(e) => return classify_store_error(e),
    };

    let iteration = match store.get_iteration_count(project, repo, pr_id).await {
        Ok(n) => n,
        Err(e) => return classify_store_error(e),
    };

    // Step 2: fetch changes.
    let files = match store.get_file_changes(project, repo, pr_id, pr).await {
        Ok(f) => f,
        Err(e) => return classify_store_error(e),
    };

    if files.is_empty() {
        return handle_empty_files(cfg, store, project, repo, pr, metadata, history_len, iteration, is_re_review).await;
    }

    // Step 3: bounded-concurrency per-file fan-out.
    let max_parallel = cfg.max_parallel_reviews.max(1);
    let total_files = files.len();
    let results: Vec<ReviewResult> = stream::iter(files.iter())
        .map(|file| async move {
            match provider.review_one(pr, file, total_files).await {
                Ok(r) => r,
                Err(e) => sentinel_result(file, &e.to_string()),
            }
        })
        .buffer_unordered(max_parallel)
        .collect()
        .await;

    // Step 4: merge.
    let merged = merge_file_results(results, total_files);

    // Step 5: validate.
    let (validated_comments, _counters) = validator::validate(merged.inline_comments, &files);

    // Step 6: resolve prior threads (ReReview only, if enabled).
    let mut fetched_existing = None;
    if is_re_review && cfg.resolve_prior_threads {
        match resolve_prior_threads(store, provider, project, repo, pr_id, &files, &cfg.attribution_tag).await {
            Ok(existing) => fetched_existing = Some(existing),
            Err(e) => tracing::warn!(error = %e, "resolution verification failed, leaving threads active"),
        }
    }

    // Step 7: post inline comments with dedup.
    let existing_threads = match fetched_existing {
        Some(existing) => existing,
        None => store
            .get_existing_threads(project, repo, pr_id, Some(&cfg.attribution_tag))
            .await
            .unwrap_or_default(),
    };

    let mut inline_comments_posted = 0usize;
    for comment in &validated_comments {
        let core_content = format!("**{}.** {}", comment.lead_in.as_str(), comment.comment);
        let tagged_content = attribute(&core_content, &cfg.attribution_tag);

        let already_posted = existing_threads.iter().any(|t| {
            t.path.as_deref() == Some(comment.path.as_str())
                && t.start_line == Some(comment.start_line)
                && t.end_line == Some(comment.end_line)
                && (t.content == tagged_content || t.content == core_content)
        });
        if already_posted {
            continue;
        }

        if let Err(e) = store
            .post_inline_comment_thread(
                project,
                repo,
                pr_id,
                &comment.path,
                comment.start_line,
                comment.end_line,
                &tagged_content,
                PostStatus::Active,
            )
            .await
        {
            tracing::warn!(error = %e, path = %comment.path, "failed to post inline comment");
            continue;
        }
        inline_comments_posted += 1;
    }

    // Step 8: post the summary thread.
    let prior_context = if is_re_review {
        Some(PriorReviewContext {
            reviewed_at_utc: metadata.reviewed_at_utc.unwrap_or_else(Utc::now),
            commit: metadata.last_reviewed_source_commit.clone(),
            iteration: metadata.last_reviewed_iteration,
            vote: if metadata.vote_submitted { Some(10) } else { None },
            was_draft: metadata.was_draft,
        })
    } else {
        None
    };

    let file_review_rows: Vec<(String, FileVerdict, String)> = merged
        .file_reviews
        .iter()
        .map(|fr: &FileReview| (fr.path.clone(), fr.verdict, fr.review_text.clone()))
        .collect();

    let summary_body = render_summary_thread(
        is_re_review,
        review_number,
        pr_id,
        prior_context.as_ref(),
        &merged.summary,
        &file_review_rows,
    );

    if let Err(e) = store
        .post_comment_thread(project, repo, pr_id, &summary_body, PostStatus::Closed)
        .await
    {
        tracing::warn!(error = %e, "failed to post summary thread");
    }

    // Step 9: vote.
    let vote = if !pr.is_draft && cfg.add_reviewer_vote {
        match store
            .add_reviewer_vote(project, repo, pr_id, merged.recommended_vote.as_i8())
            .await
        {
            Ok(()) => Some(merged.recommended_vote.as_i8()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to cast reviewer vote");
                None
            }
        }
    } else {
        None
    };

    // Step 10: update metadata, tag, and history.
    if let Ok(false) = store.has_review_tag(project, repo, pr_id).await {
        let _ = store.add_review_tag(project, repo, pr_id).await;
    }

    metadata.review_count = history_len as u64 + 1;
    metadata.last_reviewed_source_commit = pr.source_commit.clone();
    metadata.last_reviewed_target_commit = pr.target_commit.clone();
    metadata.last_reviewed_iteration = iteration;
    metadata.was_draft = pr.is_draft;
    metadata.reviewed_at_utc = Some(Utc::now());
    metadata.vote_submitted = vote.is_some();

    if let Err(e) = store.set_metadata(project, repo, pr_id, metadata).await {
        return classify_store_error(e);
    }

    let action = if is_re_review { HistoryAction::ReReview } else { HistoryAction::FullReview };
    let entry = ReviewHistoryEntry {
        review_number,
        reviewed_at_utc: Utc::now(),
        action,
        verdict: merged.summary.verdict.to_string(),
        source_commit: pr.source_commit.clone(),
        iteration,
        is_draft: pr.is_draft,
        inline_comments_posted,
        files_changed: total_files,
        vote,
        metrics: merged.metrics.clone(),
    };
    if let Err(e) = store.append_history(project, repo, pr_id, &entry).await {
        return classify_store_error(e);
    }

    let new_description = append_history_row(
        &pr.description,
        &HistoryRow {
            review_number,
            date_utc: Utc::now(),
            action: action.as_str(),
            verdict: merged.summary.verdict.to_string(),
            commit: pr.source_commit.clone(),
            iteration,
            scope: format!("{total_files} file(s)"),
        },
    );
    if let Err(e) = store.update_pr_description(project, repo, pr_id, &new_description).await {
        tracing::warn!(error = %e, "failed to update PR description history table");
    }

    // Step 11: severity counters over the validated/posted inline comments.
    let (error_count, warning_count, info_count) = partition_by_severity(&validated_comments);

    RunOutcome::Reviewed(ReviewedSummary {
        recommendation: merged.recommended_vote,
        vote,
        issue_count: validated_comments.len(),
        error_count,
        warning_count,
        info_count,
        summary: merged.summary.description.clone(),
    })
}

async fn handle_empty_files<S: ReviewStateStore>(
    cfg: &OrchestratorConfig,
    store: &S,
    project: &str,
    repo: &str,
    pr: &PullRequestSnapshot,
    metadata: &mut ReviewMetadata,
    history_len: usize,
    iteration: i64,
    is_re_review: bool,
) -> RunOutcome {
    let pr_id = pr.pr_id;
    let review_number = history_len as u64 + 1;

    let body = format!(
        "## {} -- PR {pr_id}\n\n### Summary\n\nNo files changed. Auto-approved.\n\n### Verdict: **APPROVED**\n",
        if is_re_review { "Re-Review" } else { "Code Review" }
    );
    if let Err(e) = store.post_comment_thread(project, repo, pr_id, &body, PostStatus::Closed).await {
        tracing::warn!(error = %e, "failed to post auto-approved summary thread");
    }

    if let Ok(false) = store.has_review_tag(project, repo, pr_id).await {
        let _ = store.add_review_tag(project, repo, pr_id).await;
    }

    let vote = if !pr.is_draft && cfg.add_reviewer_vote {
        store.add_reviewer_vote(project, repo, pr_id, 10).await.ok().map(|_| 10i8)
    } else {
        None
    };

    metadata.review_count = review_number;
    metadata.last_reviewed_source_commit = pr.source_commit.clone();
    metadata.last_reviewed_target_commit = pr.target_commit.clone();
    metadata.last_reviewed_iteration = iteration;
    metadata.was_draft = pr.is_draft;
    metadata.reviewed_at_utc = Some(Utc::now());
    metadata.vote_submitted = vote.is_some();
    if let Err(e) = store.set_metadata(project, repo, pr_id, metadata).await {
        return classify_store_error(e);
    }

    let action = if is_re_review { HistoryAction::ReReview } else { HistoryAction::FullReview };
    let entry = ReviewHistoryEntry {
        review_number,
        reviewed_at_utc: Utc::now(),
        action,
        verdict: "Approved (auto — no files)".to_string(),
        source_commit: pr.source_commit.clone(),
        iteration,
        is_draft: pr.is_draft,
        inline_comments_posted: 0,
        files_changed: 0,
        vote,
        metrics: ReviewMetrics::default(),
    };
    if let Err(e) = store.append_history(project, repo, pr_id, &entry).await {
        return classify_store_error(e);
    }

    let new_description = append_history_row(
        &pr.description,
        &HistoryRow {
            review_number,
            date_utc: Utc::now(),
            action: action.as_str(),
            verdict: "Approved (auto — no files)".to_string(),
            commit: pr.source_commit.clone(),
            iteration,
            scope: "0 files".to_string(),
        },
    );
    let _ = store.update_pr_description(project, repo, pr_id, &new_description).await;

    RunOutcome::Reviewed(ReviewedSummary {
        recommendation: RecommendedVote::Approved,
        vote,
        issue_count: 0,
        error_count: 0,
        warning_count: 0,
        info_count: 0,
        summary: "No files changed; auto-approved.".to_string(),
    })
}

fn sentinel_result(file: &FileChange, err: &str) -> ReviewResult {
    ReviewResult {
        summary: ReviewSummary {
            files_changed: 1,
            edits_count: 0,
            adds_count: 0,
            deletes_count: 0,
            description: String::new(),
            verdict: crate::model::Verdict::Approved,
            verdict_justification: String::new(),
        },
        file_reviews: vec![FileReview {
            path: file.path.clone(),
            verdict: FileVerdict::Concern,
            review_text: format!("AI review failed: {err}"),
        }],
        inline_comments: Vec::new(),
        observations: Vec::new(),
        recommended_vote: RecommendedVote::Approved,
        metrics: ReviewMetrics::default(),
    }
}

fn attribute(core_content: &str, tag: &str) -> String {
    if tag.is_empty() {
        core_content.to_string()
    } else {
        format!("{core_content}\n\n_[{tag}]_")
    }
}

fn partition_by_severity(comments: &[crate::model::InlineComment]) -> (usize, usize, usize) {
    let mut error = 0;
    let mut warning = 0;
    let mut info = 0;
    for c in comments {
        match c.lead_in.severity_bucket() {
            SeverityBucket::Error => error += 1,
            SeverityBucket::Warning => warning += 1,
            SeverityBucket::Info => info += 1,
        }
    }
    (error, warning, info)
}

/// Step 6: resolve prior threads on ReReview. Returns the set of existing
/// AI-attributed threads fetched along the way so step 7's dedup can reuse
/// it without a second round trip.
async fn resolve_prior_threads<S: ReviewStateStore, P: ProviderPort>(
    store: &S,
    provider: &P,
    project: &str,
    repo: &str,
    pr_id: i64,
    files: &[FileChange],
    tag: &str,
) -> anyhow::Result<Vec<crate::model::ExistingCommentThread>> {
    let existing = store.get_existing_threads(project, repo, pr_id, Some(tag)).await?;
    let active: Vec<&crate::model::ExistingCommentThread> = existing
        .iter()
        .filter(|t| matches!(t.status, ThreadStatus::Active))
        .collect();

    let mut to_fix_directly = Vec::new();
    let mut batch = Vec::new();

    for thread in &active {
        let Some(path) = thread.path.as_deref() else { continue };
        let Some(fc) = files.iter().find(|f| f.path == path) else {
            to_fix_directly.push(thread.thread_id.clone());
            continue;
        };
        let (Some(start), Some(end)) = (thread.start_line, thread.end_line) else { continue };
        let range = crate::model::LineRange::new(start, end);
        let touched = fc.changed_line_ranges.iter().any(|r| r.contains(range.start) || r.contains(range.end) || range.contains(r.start));
        if !touched {
            continue;
        }
        let context = context_window(fc.modified_content.as_deref().unwrap_or(""), start, end, CONTEXT_MARGIN);
        batch.push(ResolutionCandidate {
            thread_id: thread.thread_id.clone(),
            path: path.to_string(),
            comment: thread.content.clone(),
            code_context: context,
        });
    }

    for thread_id in &to_fix_directly {
        store.update_thread_status(project, repo, pr_id, thread_id, "fixed").await.ok();
    }

    if !batch.is_empty() {
        let verdicts = match provider.verify_resolutions(&batch).await {
            Ok(v) => v,
            Err(_) => Vec::new(),
        };
        for v in verdicts {
            if v.is_fixed {
                store.update_thread_status(project, repo, pr_id, &v.thread_id, "fixed").await.ok();
            }
        }
    }

    Ok(existing)
}

fn context_window(content: &str, start: usize, end: usize, margin: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();
    if total == 0 {
        return String::new();
    }
    let window_start = start.saturating_sub(margin).max(1);
    let window_end = (end + margin).min(total);
    let slice = lines[(window_start - 1)..window_end].join("\n");
    add_line_numbers(&slice)
}
