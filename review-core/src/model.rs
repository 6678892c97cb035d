//! Core data model: the shapes every other module in this crate reads or
//! writes. Nothing here performs I/O; construction and persistence are the
//! collaborators' job (the platform-side `ReviewStateStore`, §4.7).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque identifier for a change request inside one repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrKey {
    pub org: String,
    pub project: String,
    pub repo: String,
    pub pr_id: i64,
}

impl PrKey {
    /// Normalizes org/project/repo to lowercase, matching the Rate Gate's
    /// key-normalization requirement (§4.1).
    pub fn normalized(&self) -> Self {
        Self {
            org: self.org.to_lowercase(),
            project: self.project.to_lowercase(),
            repo: self.repo.to_lowercase(),
            pr_id: self.pr_id,
        }
    }
}

/// A reviewer attached to a pull request, with their current vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: String,
    pub display_name: String,
    /// Raw platform vote, one of `{-10, -5, 0, 5, 10}`. `0` means "no vote cast".
    pub vote: i8,
}

/// Immutable view of a PR at observation time (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestSnapshot {
    pub pr_id: i64,
    pub title: String,
    pub description: String,
    pub source_branch: String,
    pub target_branch: String,
    pub author: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub is_draft: bool,
    pub source_commit: String,
    pub target_commit: String,
    pub reviewers: Vec<Reviewer>,
}

/// Kind of change a `FileChange` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Add,
    Edit,
    Delete,
    Rename,
}

/// Inclusive, 1-based line range into a file's modified content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }

    /// True if `self` and `other` are within `tolerance` lines of each other
    /// (used by both proximity gating in the validator and overlap detection
    /// in the consensus aggregator).
    pub fn within(&self, other: &LineRange, tolerance: usize) -> bool {
        self.start <= other.end.saturating_add(tolerance)
            && other.start <= self.end.saturating_add(tolerance)
    }
}

/// A single file touched by the pull request (§3 `FileChange`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub change_type: ChangeType,
    pub original_content: Option<String>,
    pub modified_content: Option<String>,
    pub unified_diff: Option<String>,
    pub changed_line_ranges: Vec<LineRange>,
}

impl FileChange {
    /// Total line count of `modified_content`, or `0` for deletes.
    pub fn total_lines(&self) -> usize {
        self.modified_content
            .as_deref()
            .map(|c| c.lines().count())
            .unwrap_or(0)
    }

    pub fn is_within_changed_ranges(&self, range: LineRange, tolerance: usize) -> bool {
        self.changed_line_ranges
            .iter()
            .any(|r| range.within(r, tolerance))
    }
}

/// Exactly the four verdict levels the Provider Port contract allows,
/// ordered by severity (`Approved` < `ApprovedWithSuggestions` < `NeedsWork`
/// < `Rejected`) so `Ord`/`max` directly implements the severity ladder (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verdict {
    Approved,
    ApprovedWithSuggestions,
    NeedsWork,
    Rejected,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Approved => "APPROVED",
            Verdict::ApprovedWithSuggestions => "APPROVED WITH SUGGESTIONS",
            Verdict::NeedsWork => "NEEDS WORK",
            Verdict::Rejected => "REJECTED",
        }
    }

    /// Illegal values are treated as `APPROVED`, per the Provider Port
    /// contract's clause (1).
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVED WITH SUGGESTIONS" => Verdict::ApprovedWithSuggestions,
            "NEEDS WORK" => Verdict::NeedsWork,
            "REJECTED" => Verdict::Rejected,
            _ => Verdict::Approved,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four legal recommendation values a provider may emit (§4.3, clause 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i8)]
pub enum RecommendedVote {
    Approved = 10,
    ApprovedWithSuggestions = 5,
    WaitingForAuthor = -5,
    Rejected = -10,
}

impl RecommendedVote {
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    /// The "most critical" of two votes is the numerically smaller one.
    pub fn most_critical(self, other: Self) -> Self {
        if other.as_i8() < self.as_i8() { other } else { self }
    }

    pub fn from_i8(v: i8) -> Option<Self> {
        match v {
            10 => Some(Self::Approved),
            5 => Some(Self::ApprovedWithSuggestions),
            -5 => Some(Self::WaitingForAuthor),
            -10 => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Conventional opening phrase of an inline comment (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadIn {
    Lgtm,
    GoodCatch,
    Important,
    Concern,
    Suggestion,
    Bug,
    Security,
    Performance,
}

impl LeadIn {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadIn::Lgtm => "LGTM",
            LeadIn::GoodCatch => "Good catch",
            LeadIn::Important => "Important",
            LeadIn::Concern => "Concern",
            LeadIn::Suggestion => "Suggestion",
            LeadIn::Bug => "Bug",
            LeadIn::Security => "Security",
            LeadIn::Performance => "Performance",
        }
    }

    /// Severity bucket used to partition posted comments (§4.6.2 step 11).
    pub fn severity_bucket(self) -> SeverityBucket {
        match self {
            LeadIn::Bug | LeadIn::Security => SeverityBucket::Error,
            LeadIn::Concern | LeadIn::Performance => SeverityBucket::Warning,
            _ => SeverityBucket::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityBucket {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentStatus {
    Active,
    Closed,
}

/// An AI-produced inline comment, mutable during validation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineComment {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub lead_in: LeadIn,
    pub comment: String,
    pub code_snippet: Option<String>,
    pub status: CommentStatus,
}

impl InlineComment {
    pub fn line_range(&self) -> LineRange {
        LineRange::new(self.start_line, self.end_line)
    }
}

/// Aggregate counts and the freeform narrative for one review (§3 `summary`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub files_changed: usize,
    pub edits_count: usize,
    pub adds_count: usize,
    pub deletes_count: usize,
    pub description: String,
    pub verdict: Verdict,
    pub verdict_justification: String,
}

/// Per-file verdict and narrative (§3 `fileReviews`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReview {
    pub path: String,
    pub verdict: FileVerdict,
    pub review_text: String,
}

/// File-level verdict vocabulary, distinct from the PR-level `Verdict`:
/// the orchestrator only cares whether a file warrants mention in the
/// summary (`Concern`/`Rejected`) or is clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileVerdict {
    Clean,
    Concern,
    Rejected,
}

impl FileVerdict {
    /// Files worth enumerating in "### Code Changes Review" (§4.6.2 step 8).
    pub fn warrants_mention(self) -> bool {
        matches!(self, FileVerdict::Concern | FileVerdict::Rejected)
    }
}

/// Token/latency metrics for one provider call (§3 `metrics`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewMetrics {
    pub model_name: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub ai_duration_ms: u64,
}

/// Output of one provider call, for one scope (whole PR or single file) (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub summary: ReviewSummary,
    pub file_reviews: Vec<FileReview>,
    pub inline_comments: Vec<InlineComment>,
    pub observations: Vec<String>,
    pub recommended_vote: RecommendedVote,
    pub metrics: ReviewMetrics,
}

impl ReviewResult {
    /// Case-insensitive union of two observation lists.
    pub fn union_observations(a: &[String], b: &[String]) -> Vec<String> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut out = Vec::new();
        for s in a.iter().chain(b.iter()) {
            let key = s.to_ascii_lowercase();
            if seen.insert(key) {
                out.push(s.clone());
            }
        }
        out
    }
}

/// Canonical per-PR state, mutated exclusively by the Orchestrator (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewMetadata {
    pub last_reviewed_source_commit: String,
    pub last_reviewed_target_commit: String,
    pub last_reviewed_iteration: i64,
    pub was_draft: bool,
    pub reviewed_at_utc: Option<chrono::DateTime<chrono::Utc>>,
    pub vote_submitted: bool,
    pub review_count: u64,
}

impl Default for ReviewMetadata {
    fn default() -> Self {
        Self {
            last_reviewed_source_commit: String::new(),
            last_reviewed_target_commit: String::new(),
            last_reviewed_iteration: 0,
            was_draft: false,
            reviewed_at_utc: None,
            vote_submitted: false,
            review_count: 0,
        }
    }
}

impl ReviewMetadata {
    /// Any non-empty `last_reviewed_source_commit` signals a previous review (§3).
    pub fn has_previous_review(&self) -> bool {
        !self.last_reviewed_source_commit.is_empty()
    }
}

/// Action string recorded in the append-only history (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryAction {
    FullReview,
    ReReview,
    VoteOnly,
    Skipped,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryAction::FullReview => "Full Review",
            HistoryAction::ReReview => "Re-Review",
            HistoryAction::VoteOnly => "Vote Only",
            HistoryAction::Skipped => "Skipped",
        }
    }
}

/// Append-only event record (§3 `ReviewHistoryEntry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewHistoryEntry {
    pub review_number: u64,
    pub reviewed_at_utc: chrono::DateTime<chrono::Utc>,
    pub action: HistoryAction,
    pub verdict: String,
    pub source_commit: String,
    pub iteration: i64,
    pub is_draft: bool,
    pub inline_comments_posted: usize,
    pub files_changed: usize,
    pub vote: Option<i8>,
    pub metrics: ReviewMetrics,
}

/// Platform status codes for a thread (§6 "Thread status domain").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadStatus {
    Active = 1,
    Fixed = 2,
    WontFix = 3,
    Closed = 4,
    ByDesign = 5,
    Pending = 6,
}

impl ThreadStatus {
    /// Unknown names default to `Closed` per §6.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "active" => ThreadStatus::Active,
            "fixed" => ThreadStatus::Fixed,
            "wontfix" => ThreadStatus::WontFix,
            "bydesign" => ThreadStatus::ByDesign,
            "pending" => ThreadStatus::Pending,
            _ => ThreadStatus::Closed,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Read-only view of a prior thread on the PR (§3 `ExistingCommentThread`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingCommentThread {
    pub thread_id: String,
    pub path: Option<String>,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub content: String,
    pub status: ThreadStatus,
}

impl ExistingCommentThread {
    /// Derived from the presence of the attribution tag in `content` (§3).
    pub fn is_ai_generated(&self, attribution_tag: &str) -> bool {
        !attribution_tag.is_empty() && self.content.contains(&format!("_[{attribution_tag}]_"))
    }
}
