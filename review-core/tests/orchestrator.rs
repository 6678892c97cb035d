//! Integration tests for the Orchestrator entry point (§4.6), driven
//! against hand-written fakes rather than mocks, matching this workspace's
//! enum-dispatch-over-mocking style for the Provider Port/State Store seam.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use tokio::sync::Mutex;

use review_core::model::{
    ChangeType, CommentStatus, ExistingCommentThread, FileChange, FileReview, FileVerdict,
    InlineComment, LeadIn, LineRange, PullRequestSnapshot, RecommendedVote, Reviewer,
    ReviewHistoryEntry, ReviewMetadata, ReviewMetrics, ReviewResult, ReviewSummary, ThreadStatus,
    Verdict,
};
use review_core::orchestrator::{self, OrchestratorConfig, RunOutcome};
use review_core::provider::{ProviderPort, ResolutionCandidate, ResolutionVerdict};
use review_core::rate_gate::RateGate;
use review_core::state_store::{PostStatus, ReviewStateStore};

fn pr(pr_id: i64, source_commit: &str, is_draft: bool) -> PullRequestSnapshot {
    PullRequestSnapshot {
        pr_id,
        title: "Add feature".into(),
        description: "## Description\n\nDoes a thing.\n".into(),
        source_branch: "feature/x".into(),
        target_branch: "main".into(),
        author: "alice".into(),
        created_at: Utc::now(),
        is_draft,
        source_commit: source_commit.into(),
        target_commit: "base123".into(),
        reviewers: vec![Reviewer {
            id: "r1".into(),
            display_name: "bot".into(),
            vote: 0,
        }],
    }
}

fn file_change(path: &str, content: &str, ranges: Vec<(usize, usize)>) -> FileChange {
    FileChange {
        path: path.to_string(),
        change_type: ChangeType::Edit,
        original_content: Some(String::new()),
        modified_content: Some(content.to_string()),
        unified_diff: None,
        changed_line_ranges: ranges.into_iter().map(|(s, e)| LineRange::new(s, e)).collect(),
    }
}

/// A `ReviewStateStore` backed entirely by in-memory state, recording every
/// side effect the orchestrator attempts so tests can assert on it.
struct FakeStore {
    pr: PullRequestSnapshot,
    files: Vec<FileChange>,
    metadata: Mutex<ReviewMetadata>,
    history: Mutex<Vec<ReviewHistoryEntry>>,
    existing_threads: Mutex<Vec<ExistingCommentThread>>,
    description: Mutex<String>,
    posted_inline: Mutex<Vec<(String, usize, usize, String)>>,
    posted_summaries: Mutex<Vec<(String, PostStatus)>>,
    votes: Mutex<Vec<i8>>,
    has_tag: Mutex<bool>,
    iteration: i64,
    summary_comment_count: usize,
    updated_thread_status: Mutex<Vec<(String, String)>>,
}

impl FakeStore {
    fn new(pr: PullRequestSnapshot, files: Vec<FileChange>) -> Self {
        Self {
            pr,
            files,
            metadata: Mutex::new(ReviewMetadata::default()),
            history: Mutex::new(Vec::new()),
            existing_threads: Mutex::new(Vec::new()),
            description: Mutex::new(String::new()),
            posted_inline: Mutex::new(Vec::new()),
            posted_summaries: Mutex::new(Vec::new()),
            votes: Mutex::new(Vec::new()),
            has_tag: Mutex::new(false),
            iteration: 1,
            summary_comment_count: 0,
            updated_thread_status: Mutex::new(Vec::new()),
        }
    }

    fn with_metadata(self, metadata: ReviewMetadata) -> Self {
        *self.metadata.try_lock().unwrap() = metadata;
        self
    }

    fn with_existing_threads(self, threads: Vec<ExistingCommentThread>) -> Self {
        *self.existing_threads.try_lock().unwrap() = threads;
        self
    }
}

impl ReviewStateStore for FakeStore {
    async fn get_pr(&self, _project: &str, _repo: &str, _pr_id: i64) -> anyhow::Result<PullRequestSnapshot> {
        Ok(self.pr.clone())
    }

    async fn get_iteration_count(&self, _project: &str, _repo: &str, _pr_id: i64) -> anyhow::Result<i64> {
        Ok(self.iteration)
    }

    async fn get_metadata(&self, _project: &str, _repo: &str, _pr_id: i64) -> anyhow::Result<ReviewMetadata> {
        Ok(self.metadata.lock().await.clone())
    }

    async fn set_metadata(
        &self,
        _project: &str,
        _repo: &str,
        _pr_id: i64,
        metadata: &ReviewMetadata,
    ) -> anyhow::Result<()> {
        *self.metadata.lock().await = metadata.clone();
        Ok(())
    }

    async fn get_history(&self, _project: &str, _repo: &str, _pr_id: i64) -> anyhow::Result<Vec<ReviewHistoryEntry>> {
        Ok(self.history.lock().await.clone())
    }

    async fn append_history(
        &self,
        _project: &str,
        _repo: &str,
        _pr_id: i64,
        entry: &ReviewHistoryEntry,
    ) -> anyhow::Result<()> {
        self.history.lock().await.push(entry.clone());
        Ok(())
    }

    async fn get_existing_threads(
        &self,
        _project: &str,
        _repo: &str,
        _pr_id: i64,
        _attribution_tag: Option<&str>,
    ) -> anyhow::Result<Vec<ExistingCommentThread>> {
        Ok(self.existing_threads.lock().await.clone())
    }

    async fn update_thread_status(
        &self,
        _project: &str,
        _repo: &str,
        _pr_id: i64,
        thread_id: &str,
        status_name: &str,
    ) -> anyhow::Result<()> {
        self.updated_thread_status
            .lock()
            .await
            .push((thread_id.to_string(), status_name.to_string()));
        Ok(())
    }

    async fn count_summary_comments(&self, _project: &str, _repo: &str, _pr_id: i64) -> anyhow::Result<usize> {
        Ok(self.summary_comment_count)
    }

    async fn get_file_changes(
        &self,
        _project: &str,
        _repo: &str,
        _pr_id: i64,
        _pr: &PullRequestSnapshot,
    ) -> anyhow::Result<Vec<FileChange>> {
        Ok(self.files.clone())
    }

    async fn post_comment_thread(
        &self,
        _project: &str,
        _repo: &str,
        _pr_id: i64,
        content: &str,
        status: PostStatus,
    ) -> anyhow::Result<()> {
        self.posted_summaries.lock().await.push((content.to_string(), status));
        Ok(())
    }

    async fn post_inline_comment_thread(
        &self,
        _project: &str,
        _repo: &str,
        _pr_id: i64,
        path: &str,
        start_line: usize,
        end_line: usize,
        content: &str,
        _status: PostStatus,
    ) -> anyhow::Result<()> {
        self.posted_inline
            .lock()
            .await
            .push((path.to_string(), start_line, end_line, content.to_string()));
        Ok(())
    }

    async fn add_reviewer_vote(&self, _project: &str, _repo: &str, _pr_id: i64, vote: i8) -> anyhow::Result<()> {
        self.votes.lock().await.push(vote);
        Ok(())
    }

    async fn update_pr_description(
        &self,
        _project: &str,
        _repo: &str,
        _pr_id: i64,
        new_description: &str,
    ) -> anyhow::Result<()> {
        *self.description.lock().await = new_description.to_string();
        Ok(())
    }

    async fn has_review_tag(&self, _project: &str, _repo: &str, _pr_id: i64) -> anyhow::Result<bool> {
        Ok(*self.has_tag.lock().await)
    }

    async fn add_review_tag(&self, _project: &str, _repo: &str, _pr_id: i64) -> anyhow::Result<()> {
        *self.has_tag.lock().await = true;
        Ok(())
    }
}

/// A `ProviderPort` that returns one fixed finding per file and counts calls.
struct FakeProvider {
    calls: AtomicUsize,
    lead_in: LeadIn,
    verdict: Verdict,
    vote: RecommendedVote,
}

impl FakeProvider {
    fn new(lead_in: LeadIn, verdict: Verdict, vote: RecommendedVote) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            lead_in,
            verdict,
            vote,
        }
    }
}

impl ProviderPort for FakeProvider {
    fn name(&self) -> &str {
        "fake-provider"
    }

    async fn review_all(&self, _pr: &PullRequestSnapshot, _files: &[FileChange]) -> anyhow::Result<ReviewResult> {
        unreachable!("the orchestrator's file fan-out uses review_one, not review_all")
    }

    async fn review_one(
        &self,
        _pr: &PullRequestSnapshot,
        file: &FileChange,
        _total_files_in_pr: usize,
    ) -> anyhow::Result<ReviewResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ReviewResult {
            summary: ReviewSummary {
                files_changed: 1,
                edits_count: 1,
                adds_count: 0,
                deletes_count: 0,
                description: format!("Reviewed {}", file.path),
                verdict: self.verdict,
                verdict_justification: "see inline comments".into(),
            },
            file_reviews: vec![FileReview {
                path: file.path.clone(),
                verdict: FileVerdict::Concern,
                review_text: "off by one on the loop bound".into(),
            }],
            inline_comments: vec![InlineComment {
                path: file.path.clone(),
                start_line: 5,
                end_line: 5,
                lead_in: self.lead_in,
                comment: "off by one on the loop bound".into(),
                code_snippet: None,
                status: CommentStatus::Active,
            }],
            observations: Vec::new(),
            recommended_vote: self.vote,
            metrics: ReviewMetrics {
                model_name: "fake-model".into(),
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
                ai_duration_ms: 5,
            },
        })
    }

    async fn verify_resolutions(&self, candidates: &[ResolutionCandidate]) -> anyhow::Result<Vec<ResolutionVerdict>> {
        Ok(candidates
            .iter()
            .map(|c| ResolutionVerdict {
                thread_id: c.thread_id.clone(),
                is_fixed: true,
                reasoning: "addressed".into(),
            })
            .collect())
    }
}

fn content_with_changed_line_5() -> String {
    (1..=20).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
}

#[tokio::test]
async fn full_review_posts_comment_and_casts_vote() {
    let pr = pr(42, "commit-a", false);
    let files = vec![file_change("src/lib.rs", &content_with_changed_line_5(), vec![(3, 7)])];
    let store = FakeStore::new(pr, files);
    let provider = FakeProvider::new(LeadIn::Bug, Verdict::NeedsWork, RecommendedVote::WaitingForAuthor);
    let cfg = OrchestratorConfig::default();
    let rate_gate = RateGate::new();

    let outcome = orchestrator::run(&cfg, &rate_gate, &store, &provider, "org", "proj", "repo", 42).await;

    match outcome {
        RunOutcome::Reviewed(summary) => {
            assert_eq!(summary.vote, Some(-5));
            assert_eq!(summary.recommendation, RecommendedVote::WaitingForAuthor);
            assert_eq!(summary.issue_count, 1);
            assert_eq!(summary.error_count, 1);
            assert_eq!(summary.warning_count, 0);
        }
        other => panic!("expected Reviewed, got {other:?}"),
    }

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.posted_inline.lock().await.len(), 1);
    assert_eq!(store.posted_summaries.lock().await.len(), 1);
    assert_eq!(store.votes.lock().await.as_slice(), &[-5i8]);
    assert_eq!(store.history.lock().await.len(), 1);
    assert!(*store.has_tag.lock().await);

    let metadata = store.metadata.lock().await.clone();
    assert_eq!(metadata.last_reviewed_source_commit, "commit-a");
    assert!(metadata.vote_submitted);
    assert_eq!(metadata.review_count, 1);
}

#[tokio::test]
async fn empty_file_set_auto_approves_without_calling_the_provider() {
    let pr = pr(7, "commit-a", false);
    let store = FakeStore::new(pr, Vec::new());
    let provider = FakeProvider::new(LeadIn::Bug, Verdict::NeedsWork, RecommendedVote::WaitingForAuthor);
    let cfg = OrchestratorConfig::default();
    let rate_gate = RateGate::new();

    let outcome = orchestrator::run(&cfg, &rate_gate, &store, &provider, "org", "proj", "repo", 7).await;

    match outcome {
        RunOutcome::Reviewed(summary) => {
            assert_eq!(summary.vote, Some(10));
            assert_eq!(summary.issue_count, 0);
        }
        other => panic!("expected Reviewed, got {other:?}"),
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.votes.lock().await.as_slice(), &[10i8]);
}

#[tokio::test]
async fn unchanged_commit_skips_and_still_appends_history() {
    let pr = pr(9, "commit-a", false);
    let mut metadata = ReviewMetadata::default();
    metadata.last_reviewed_source_commit = "commit-a".to_string();
    metadata.was_draft = false;
    let store = FakeStore::new(pr, Vec::new()).with_metadata(metadata);
    let provider = FakeProvider::new(LeadIn::Bug, Verdict::Approved, RecommendedVote::Approved);
    let cfg = OrchestratorConfig::default();
    let rate_gate = RateGate::new();

    let outcome = orchestrator::run(&cfg, &rate_gate, &store, &provider, "org", "proj", "repo", 9).await;

    match outcome {
        RunOutcome::Skipped { .. } => {}
        other => panic!("expected Skipped, got {other:?}"),
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.history.lock().await.len(), 1);
    assert!(store.votes.lock().await.is_empty());
}

#[tokio::test]
async fn second_call_within_interval_is_rate_limited_with_no_side_effects() {
    let pr = pr(11, "commit-a", false);
    let files = vec![file_change("src/lib.rs", &content_with_changed_line_5(), vec![(3, 7)])];
    let store = FakeStore::new(pr, files);
    let provider = FakeProvider::new(LeadIn::Suggestion, Verdict::Approved, RecommendedVote::Approved);
    let cfg = OrchestratorConfig::default();
    let rate_gate = RateGate::new();

    let first = orchestrator::run(&cfg, &rate_gate, &store, &provider, "org", "proj", "repo", 11).await;
    assert!(matches!(first, RunOutcome::Reviewed(_)));

    let second = orchestrator::run(&cfg, &rate_gate, &store, &provider, "org", "proj", "repo", 11).await;
    match second {
        RunOutcome::RateLimited { seconds_remaining } => {
            assert!(seconds_remaining > 0);
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
    // Only the first run's side effects should be visible.
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.history.lock().await.len(), 1);
}

#[tokio::test]
async fn re_review_verifies_and_closes_fixed_prior_threads() {
    let pr = pr(13, "commit-b", false);
    let files = vec![file_change("src/lib.rs", &content_with_changed_line_5(), vec![(3, 7)])];
    let mut metadata = ReviewMetadata::default();
    metadata.last_reviewed_source_commit = "commit-a".to_string();
    metadata.last_reviewed_target_commit = "base123".to_string();
    metadata.was_draft = false;
    metadata.reviewed_at_utc = Some(Utc::now());
    let prior_thread = ExistingCommentThread {
        thread_id: "100".into(),
        path: Some("src/lib.rs".into()),
        start_line: Some(4),
        end_line: Some(4),
        content: "**Bug.** something was wrong\n\n_[ai-code-review]_".into(),
        status: ThreadStatus::Active,
    };
    let store = FakeStore::new(pr, files)
        .with_metadata(metadata)
        .with_existing_threads(vec![prior_thread]);
    let provider = FakeProvider::new(LeadIn::Bug, Verdict::NeedsWork, RecommendedVote::WaitingForAuthor);
    let cfg = OrchestratorConfig::default();
    let rate_gate = RateGate::new();

    let outcome = orchestrator::run(&cfg, &rate_gate, &store, &provider, "org", "proj", "repo", 13).await;

    assert!(matches!(outcome, RunOutcome::Reviewed(_)));
    let updates = store.updated_thread_status.lock().await.clone();
    assert_eq!(updates, vec![("100".to_string(), "fixed".to_string())]);
}
