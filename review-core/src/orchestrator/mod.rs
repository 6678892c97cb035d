//! Review Orchestrator (§4.6): the state machine that decides, for each
//! request, which of `{FullReview, ReReview, VoteOnly, Skip}` to run, then
//! drives the corresponding handler.

mod decision;
mod full_review;
mod merge;
mod render;

pub use decision::Action;
pub use render::{HistoryRow, PriorReviewContext};

use chrono::Utc;

use crate::model::{HistoryAction, PrKey, RecommendedVote, ReviewHistoryEntry, ReviewMetrics};
use crate::provider::ProviderPort;
use crate::rate_gate::RateGate;
use crate::state_store::{PostStatus, ReviewStateStore};

/// Orchestration-level configuration (§9 "Provider registry" options plus
/// the Rate Gate interval and attribution tag).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub rate_gate_interval_minutes: i64,
    pub max_parallel_reviews: usize,
    pub add_reviewer_vote: bool,
    pub attribution_tag: String,
    /// Whether ReReview should attempt resolution verification (§4.6.2 step 6
    /// says "only on ReReview, if enabled").
    pub resolve_prior_threads: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rate_gate_interval_minutes: 5,
            max_parallel_reviews: 5,
            add_reviewer_vote: true,
            attribution_tag: "ai-code-review".to_string(),
            resolve_prior_threads: true,
        }
    }
}

/// Everything a `Reviewed` outcome reports back to the caller (§4.6.2 step 11,
/// and the reduced shapes used by VoteOnly and the empty-files handler).
#[derive(Debug, Clone)]
pub struct ReviewedSummary {
    pub recommendation: RecommendedVote,
    pub vote: Option<i8>,
    pub issue_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub summary: String,
}

/// The orchestrator's top-level result. Every failure kind in §7 maps onto
/// one of these variants; the state machine never propagates an error out
/// of `run`.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    RateLimited { seconds_remaining: u64 },
    Skipped { summary: String },
    Reviewed(ReviewedSummary),
    Error { message: String },
}

/// Classifies a `ReviewStateStore` call failure on a primary-path
/// operation (§7): a platform 429 surfaces as `RunOutcome::RateLimited` so
/// the caller can reschedule, anything else is fatal.
pub(super) fn classify_store_error(e: anyhow::Error) -> RunOutcome {
    match crate::errors::StateStoreError::retry_after_secs(&e) {
        Some(seconds_remaining) => RunOutcome::RateLimited { seconds_remaining },
        None => RunOutcome::Error { message: e.to_string() },
    }
}

/// Entry point (§4.6). `org` scopes the Rate Gate's cooldown key; it is not
/// passed to the `ReviewStateStore`, whose implementor is already scoped to
/// one organization (§4.7's operations take only `project`/`repo`/`prId`).
pub async fn run<S: ReviewStateStore, P: ProviderPort>(
    cfg: &OrchestratorConfig,
    rate_gate: &RateGate,
    store: &S,
    provider: &P,
    org: &str,
    project: &str,
    repo: &str,
    pr_id: i64,
) -> RunOutcome {
    let key = PrKey {
        org: org.to_string(),
        project: project.to_string(),
        repo: repo.to_string(),
        pr_id,
    };

    let check = rate_gate.check(&key, cfg.rate_gate_interval_minutes).await;
    if !check.allowed {
        return RunOutcome::RateLimited {
            seconds_remaining: check.seconds_remaining,
        };
    }

    let pr = match store.get_pr(project, repo, pr_id).await {
        Ok(pr) => pr,
        Err(e) => return classify_store_error(e),
    };

    let mut metadata = match store.get_metadata(project, repo, pr_id).await {
        Ok(m) => m,
        Err(e) => return classify_store_error(e),
    };

    let action = decision::decide(&metadata, &pr, cfg.add_reviewer_vote);

    let outcome = match action {
        Action::Skip => handle_skip(store, project, repo, &pr).await,
        Action::VoteOnly => handle_vote_only(store, project, repo, &pr, &mut metadata).await,
        Action::FullReview => {
            full_review::handle(cfg, store, provider, project, repo, &pr, &mut metadata, false).await
        }
        Action::ReReview => {
            full_review::handle(cfg, store, provider, project, repo, &pr, &mut metadata, true).await
        }
    };

    // Rate-limited preflight has no side effects. Fatal errors are not
    // recorded either (§8 "All providers fail a reviewOne -> fatal; ...
    // Rate Gate not recorded"). Every other outcome records, including the
    // empty-files auto-approve path (§9 Open Question 1).
    if !matches!(outcome, RunOutcome::Error { .. }) {
        rate_gate.record(&key).await;
    }

    outcome
}

async fn handle_skip<S: ReviewStateStore>(
    store: &S,
    project: &str,
    repo: &str,
    pr: &crate::model::PullRequestSnapshot,
) -> RunOutcome {
    let pr_id = pr.pr_id;
    let history_len = match store.get_history(project, repo, pr_id).await {
        Ok(h) => h.len(),
        Err(e) => return classify_store_error(e),
    };
    let iteration = store.get_iteration_count(project, repo, pr_id).await.unwrap_or(0);

    let entry = ReviewHistoryEntry {
        review_number: history_len as u64 + 1,
        reviewed_at_utc: Utc::now(),
        action: HistoryAction::Skipped,
        verdict: "No Changes".to_string(),
        source_commit: pr.source_commit.clone(),
        iteration,
        is_draft: pr.is_draft,
        inline_comments_posted: 0,
        files_changed: 0,
        vote: None,
        metrics: ReviewMetrics::default(),
    };
    if let Err(e) = store.append_history(project, repo, pr_id, &entry).await {
        return classify_store_error(e);
    }

    let new_description = render::append_history_row(
        &pr.description,
        &render::HistoryRow {
            review_number: entry.review_number,
            date_utc: entry.reviewed_at_utc,
            action: HistoryAction::Skipped.as_str(),
            verdict: "No Changes".to_string(),
            commit: pr.source_commit.clone(),
            iteration,
            scope: "0 files".to_string(),
        },
    );
    let _ = store.update_pr_description(project, repo, pr_id, &new_description).await;

    RunOutcome::Skipped {
        summary: format!("PR {pr_id} has already been reviewed at this commit; nothing to do."),
    }
}

async fn handle_vote_only<S: ReviewStateStore>(
    store: &S,
    project: &str,
    repo: &str,
    pr: &crate::model::PullRequestSnapshot,
    metadata: &mut crate::model::ReviewMetadata,
) -> RunOutcome {
    let pr_id = pr.pr_id;
    let history_len = match store.get_history(project, repo, pr_id).await {
        Ok(h) => h.len(),
        Err(e) => return classify_store_error(e),
    };
    let iteration = store.get_iteration_count(project, repo, pr_id).await.unwrap_or(0);

    let vote = store.add_reviewer_vote(project, repo, pr_id, 5).await.is_ok().then_some(5i8);

    metadata.vote_submitted = vote.is_some();
    metadata.was_draft = false;
    metadata.review_count = history_len as u64 + 1;
    metadata.reviewed_at_utc = Some(Utc::now());
    if let Err(e) = store.set_metadata(project, repo, pr_id, metadata).await {
        return classify_store_error(e);
    }

    let entry = ReviewHistoryEntry {
        review_number: history_len as u64 + 1,
        reviewed_at_utc: Utc::now(),
        action: HistoryAction::VoteOnly,
        verdict: "Draft-to-active".to_string(),
        source_commit: pr.source_commit.clone(),
        iteration,
        is_draft: false,
        inline_comments_posted: 0,
        files_changed: 0,
        vote,
        metrics: ReviewMetrics::default(),
    };
    if let Err(e) = store.append_history(project, repo, pr_id, &entry).await {
        return classify_store_error(e);
    }

    let body = format!(
        "## Draft-to-active (Review {}) -- PR {pr_id}\n\nThis PR moved out of draft with no new commits; casting a suggested vote.\n",
        entry.review_number
    );
    let _ = store.post_comment_thread(project, repo, pr_id, &body, PostStatus::Closed).await;

    RunOutcome::Reviewed(ReviewedSummary {
        recommendation: RecommendedVote::ApprovedWithSuggestions,
        vote,
        issue_count: 0,
        error_count: 0,
        warning_count: 0,
        info_count: 0,
        summary: "Draft-to-active transition detected; casting suggested vote.".to_string(),
    })
}
