//! Per-file result merge (§4.6.2 step 4): concatenates per-file
//! `ReviewResult`s produced by the fan-out into one authoritative result.

use crate::model::{
    FileReview, RecommendedVote, ReviewMetrics, ReviewResult, ReviewSummary, Verdict,
};

pub fn merge_file_results(results: Vec<ReviewResult>, files_changed: usize) -> ReviewResult {
    let worst_verdict = results
        .iter()
        .map(|r| r.summary.verdict)
        .max()
        .unwrap_or(Verdict::Approved);

    let recommended_vote = results
        .iter()
        .map(|r| r.recommended_vote)
        .reduce(|a, b| a.most_critical(b))
        .unwrap_or(RecommendedVote::Approved);

    let edits_count: usize = results.iter().map(|r| r.summary.edits_count).sum();
    let adds_count: usize = results.iter().map(|r| r.summary.adds_count).sum();
    let deletes_count: usize = results.iter().map(|r| r.summary.deletes_count).sum();

    let mut inline_comments = Vec::new();
    let mut file_reviews: Vec<FileReview> = Vec::new();
    let mut observations: Vec<String> = Vec::new();

    let mut prompt_tokens = 0u64;
    let mut completion_tokens = 0u64;
    let mut total_tokens = 0u64;
    let mut ai_duration_ms = 0u64;

    let mut descriptions = Vec::new();
    let mut justifications = Vec::new();

    for r in results {
        inline_comments.extend(r.inline_comments);
        file_reviews.extend(r.file_reviews);
        observations = ReviewResult::union_observations(&observations, &r.observations);
        prompt_tokens += r.metrics.prompt_tokens;
        completion_tokens += r.metrics.completion_tokens;
        total_tokens += r.metrics.total_tokens;
        ai_duration_ms += r.metrics.ai_duration_ms;
        if !r.summary.description.trim().is_empty() {
            descriptions.push(r.summary.description);
        }
        if !r.summary.verdict_justification.trim().is_empty() {
            justifications.push(r.summary.verdict_justification);
        }
    }

    ReviewResult {
        summary: ReviewSummary {
            files_changed,
            edits_count,
            adds_count,
            deletes_count,
            description: descriptions.join("\n\n"),
            verdict: worst_verdict,
            verdict_justification: justifications.join("\n\n"),
        },
        file_reviews,
        inline_comments,
        observations,
        recommended_vote,
        metrics: ReviewMetrics {
            model_name: String::new(),
            prompt_tokens,
            completion_tokens,
            total_tokens,
            ai_duration_ms,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileVerdict;

    fn result(verdict: Verdict, vote: RecommendedVote) -> ReviewResult {
        ReviewResult {
            summary: ReviewSummary {
                files_changed: 1,
                edits_count: 1,
                adds_count: 0,
                deletes_count: 0,
                description: "d".into(),
                verdict,
                verdict_justification: "j".into(),
            },
            file_reviews: vec![FileReview {
                path: "a.rs".into(),
                verdict: FileVerdict::Clean,
                review_text: "ok".into(),
            }],
            inline_comments: Vec::new(),
            observations: Vec::new(),
            recommended_vote: vote,
            metrics: ReviewMetrics::default(),
        }
    }

    #[test]
    fn takes_worst_verdict_and_min_vote() {
        let merged = merge_file_results(
            vec![
                result(Verdict::Approved, RecommendedVote::Approved),
                result(Verdict::NeedsWork, RecommendedVote::WaitingForAuthor),
            ],
            2,
        );
        assert_eq!(merged.summary.verdict, Verdict::NeedsWork);
        assert_eq!(merged.recommended_vote.as_i8(), -5);
        assert_eq!(merged.summary.edits_count, 2);
    }
}
