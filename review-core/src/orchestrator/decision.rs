//! Action decision (§4.6.1): a pure function of metadata, PR snapshot, and
//! the `addReviewerVote` orchestration flag.

use crate::model::{PullRequestSnapshot, ReviewMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    FullReview,
    ReReview,
    VoteOnly,
    Skip,
}

pub fn decide(metadata: &ReviewMetadata, pr: &PullRequestSnapshot, add_reviewer_vote: bool) -> Action {
    if !metadata.has_previous_review() {
        return Action::FullReview;
    }
    if !metadata
        .last_reviewed_source_commit
        .eq_ignore_ascii_case(&pr.source_commit)
    {
        return Action::ReReview;
    }
    if metadata.was_draft && !pr.is_draft && !metadata.vote_submitted && add_reviewer_vote {
        return Action::VoteOnly;
    }
    Action::Skip
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pr(source_commit: &str, is_draft: bool) -> PullRequestSnapshot {
        PullRequestSnapshot {
            pr_id: 1,
            title: "t".into(),
            description: "d".into(),
            source_branch: "feature".into(),
            target_branch: "main".into(),
            author: "me".into(),
            created_at: Utc::now(),
            is_draft,
            source_commit: source_commit.into(),
            target_commit: "base".into(),
            reviewers: Vec::new(),
        }
    }

    #[test]
    fn no_previous_review_means_full_review() {
        let m = ReviewMetadata::default();
        assert_eq!(decide(&m, &pr("abc", false), true), Action::FullReview);
    }

    #[test]
    fn changed_commit_means_re_review() {
        let mut m = ReviewMetadata::default();
        m.last_reviewed_source_commit = "old".into();
        assert_eq!(decide(&m, &pr("new", false), true), Action::ReReview);
    }

    #[test]
    fn commit_comparison_is_case_insensitive() {
        let mut m = ReviewMetadata::default();
        m.last_reviewed_source_commit = "ABC123".into();
        assert_eq!(decide(&m, &pr("abc123", false), true), Action::Skip);
    }

    #[test]
    fn draft_to_active_triggers_vote_only() {
        let mut m = ReviewMetadata::default();
        m.last_reviewed_source_commit = "abc".into();
        m.was_draft = true;
        m.vote_submitted = false;
        assert_eq!(decide(&m, &pr("abc", false), true), Action::VoteOnly);
    }

    #[test]
    fn draft_to_active_without_vote_flag_skips() {
        let mut m = ReviewMetadata::default();
        m.last_reviewed_source_commit = "abc".into();
        m.was_draft = true;
        m.vote_submitted = false;
        assert_eq!(decide(&m, &pr("abc", false), false), Action::Skip);
    }

    #[test]
    fn unchanged_commit_and_state_skips() {
        let mut m = ReviewMetadata::default();
        m.last_reviewed_source_commit = "abc".into();
        m.was_draft = false;
        assert_eq!(decide(&m, &pr("abc", false), true), Action::Skip);
    }
}
