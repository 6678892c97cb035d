//! Provider Port: the abstract contract for a single LLM reviewer (§4.3).
//!
//! Kept as a plain trait with native `async fn`, not `async-trait`: the
//! orchestrator is generic over a concrete `ProviderPort` implementor, and
//! the one place this crate needs several providers side by side
//! (`ConsensusAggregator`, §4.4) holds them in a `Vec`, not a `Vec<Box<dyn
//! _>>` — see `consensus.rs`.

use crate::model::{FileChange, PullRequestSnapshot, ReviewResult};

/// One candidate for `verifyResolutions`: a thread plus the code context
/// around its (possibly stale) line range.
#[derive(Debug, Clone)]
pub struct ResolutionCandidate {
    pub thread_id: String,
    pub path: String,
    pub comment: String,
    /// ±10-line window extracted from the file's current modified content (§4.6.2 step 6).
    pub code_context: String,
}

/// Result of checking one candidate.
#[derive(Debug, Clone)]
pub struct ResolutionVerdict {
    pub thread_id: String,
    pub is_fixed: bool,
    pub reasoning: String,
}

/// Per-provider name attached to every outcome the fan-out collects, so the
/// Consensus Aggregator can tag comments by provenance (§4.4).
pub trait ProviderPort: Send + Sync {
    /// Display name of this provider, used for provenance tagging.
    fn name(&self) -> &str;

    async fn review_all(
        &self,
        pr: &PullRequestSnapshot,
        files: &[FileChange],
    ) -> anyhow::Result<ReviewResult>;

    async fn review_one(
        &self,
        pr: &PullRequestSnapshot,
        file: &FileChange,
        total_files_in_pr: usize,
    ) -> anyhow::Result<ReviewResult>;

    async fn verify_resolutions(
        &self,
        candidates: &[ResolutionCandidate],
    ) -> anyhow::Result<Vec<ResolutionVerdict>>;
}
