//! Review State Store (§4.7): the collaborator contract the Orchestrator
//! consumes for all durable, platform-owned state. Implemented by an
//! adapter crate (the Azure DevOps adapter in this workspace); this crate
//! only defines the contract and a couple of request/response shapes that
//! don't belong on the wire-facing adapter.

use crate::model::{
    ExistingCommentThread, FileChange, PullRequestSnapshot, ReviewHistoryEntry, ReviewMetadata,
};

/// Thread creation status, accepted by `postCommentThread`/`postInlineCommentThread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Active,
    Closed,
}

/// Plain generic trait, not `async-trait`/`Box<dyn>`: the Orchestrator is
/// generic over one concrete `S: ReviewStateStore` per process.
pub trait ReviewStateStore: Send + Sync {
    async fn get_pr(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<PullRequestSnapshot>;

    async fn get_iteration_count(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<i64>;

    /// Absent fields default to zero/empty; never raises on "not found".
    async fn get_metadata(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<ReviewMetadata>;

    async fn set_metadata(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        metadata: &ReviewMetadata,
    ) -> anyhow::Result<()>;

    async fn get_history(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
    ) -> anyhow::Result<Vec<ReviewHistoryEntry>>;

    /// Read-modify-write of the stored list.
    async fn append_history(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        entry: &ReviewHistoryEntry,
    ) -> anyhow::Result<()>;

    async fn get_existing_threads(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        attribution_tag: Option<&str>,
    ) -> anyhow::Result<Vec<ExistingCommentThread>>;

    async fn update_thread_status(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        thread_id: &str,
        status_name: &str,
    ) -> anyhow::Result<()>;

    async fn count_summary_comments(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<usize>;

    async fn get_file_changes(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        pr: &PullRequestSnapshot,
    ) -> anyhow::Result<Vec<FileChange>>;

    async fn post_comment_thread(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        content: &str,
        status: PostStatus,
    ) -> anyhow::Result<()>;

    async fn post_inline_comment_thread(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        path: &str,
        start_line: usize,
        end_line: usize,
        content: &str,
        status: PostStatus,
    ) -> anyhow::Result<()>;

    /// May fail transiently; the Orchestrator treats failure as a
    /// recoverable-peripheral error (§7).
    async fn add_reviewer_vote(&self, project: &str, repo: &str, pr_id: i64, vote: i8) -> anyhow::Result<()>;

    async fn update_pr_description(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        new_description: &str,
    ) -> anyhow::Result<()>;

    async fn has_review_tag(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<bool>;

    async fn add_review_tag(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<()>;
}
