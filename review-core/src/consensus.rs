//! Consensus Aggregator (§4.4): a `ProviderPort` that wraps `N` named
//! providers and fans every call out to all of them concurrently.
//!
//! Holds its sub-providers in a plain `Vec`, not `Vec<Box<dyn ProviderPort>>`:
//! this crate is built against one concrete enum-dispatched provider type
//! (`llm_provider::DirectProvider`, generic here as `P: ProviderPort`), so no
//! heap-allocated trait object is ever required.

use std::collections::HashMap;

use crate::model::{
    FileChange, FileReview, FileVerdict, PullRequestSnapshot, RecommendedVote, ReviewResult,
    ReviewSummary, Verdict,
};
use crate::provider::{ProviderPort, ResolutionCandidate, ResolutionVerdict};

pub struct ConsensusAggregator<P: ProviderPort> {
    providers: Vec<P>,
    threshold: usize,
}

struct Outcome<T> {
    provider: String,
    value: T,
}

impl<P: ProviderPort> ConsensusAggregator<P> {
    pub fn new(providers: Vec<P>, threshold: usize) -> Self {
        let threshold = threshold.clamp(1, providers.len().max(1));
        Self { providers, threshold }
    }

    async fn fan_out<T, F, Fut>(&self, call: F) -> anyhow::Result<Vec<Outcome<T>>>
    where
        F: Fn(&P) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let mut futures = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            futures.push(async {
                let name = provider.name().to_string();
                match call(provider).await {
                    Ok(value) => Ok(Outcome { provider: name, value }),
                    Err(e) => Err((name, e)),
                }
            });
        }
        let results = futures::future::join_all(futures).await;

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for r in results {
            match r {
                Ok(o) => successes.push(o),
                Err((name, e)) => failures.push(format!("{name}: {e}")),
            }
        }

        if successes.is_empty() {
            anyhow::bail!("all providers failed: {}", failures.join("; "));
        }
        Ok(successes)
    }

    pub async fn review_all(
        &self,
        pr: &PullRequestSnapshot,
        files: &[FileChange],
    ) -> anyhow::Result<ReviewResult> {
        let outcomes = self
            .fan_out(|p| p.review_all(pr, files))
            .await?;
        Ok(merge_results(outcomes, self.threshold))
    }

    pub async fn review_one(
        &self,
        pr: &PullRequestSnapshot,
        file: &FileChange,
        total_files_in_pr: usize,
    ) -> anyhow::Result<ReviewResult> {
        let outcomes = self
            .fan_out(|p| p.review_one(pr, file, total_files_in_pr))
            .await?;
        Ok(merge_results(outcomes, self.threshold))
    }

    pub async fn verify_resolutions(
        &self,
        candidates: &[ResolutionCandidate],
    ) -> anyhow::Result<Vec<ResolutionVerdict>> {
        let outcomes = self
            .fan_out(|p| p.verify_resolutions(candidates))
            .await?;
        Ok(merge_verifications(outcomes))
    }
}

fn merge_results(outcomes: Vec<Outcome<ReviewResult>>, threshold: usize) -> ReviewResult {
    let provider_count = outcomes.len();
    let provider_names: Vec<&str> = outcomes.iter().map(|o| o.provider.as_str()).collect();

    // tag every inline comment by its source provider before pooling.
    let pool: Vec<(String, crate::model::InlineComment)> = outcomes
        .iter()
        .flat_map(|o| {
            o.value
                .inline_comments
                .iter()
                .cloned()
                .map(move |c| (o.provider.clone(), c))
        })
        .collect();

    let merged_comments = cluster_and_merge(pool, threshold);

    let worst_verdict = outcomes
        .iter()
        .map(|o| o.value.summary.verdict)
        .max()
        .unwrap_or(Verdict::Approved);

    let winning = outcomes
        .iter()
        .filter(|o| o.value.summary.verdict == worst_verdict)
        .next()
        .expect("at least one outcome produced the worst verdict");

    let recommended_vote = outcomes
        .iter()
        .map(|o| o.value.recommended_vote)
        .reduce(|a, b| a.most_critical(b))
        .unwrap_or(RecommendedVote::Approved);

    let mut by_path: HashMap<String, FileReview> = HashMap::new();
    for o in &outcomes {
        for fr in &o.value.file_reviews {
            by_path
                .entry(fr.path.clone())
                .and_modify(|existing| {
                    if file_verdict_rank(fr.verdict) > file_verdict_rank(existing.verdict) {
                        *existing = fr.clone();
                    }
                })
                .or_insert_with(|| fr.clone());
        }
    }
    let mut file_reviews: Vec<FileReview> = by_path.into_values().collect();
    file_reviews.sort_by(|a, b| a.path.cmp(&b.path));

    let observations = outcomes
        .iter()
        .map(|o| o.value.observations.clone())
        .reduce(|a, b| crate::model::ReviewResult::union_observations(&a, &b))
        .unwrap_or_default();

    let total_prompt: u64 = outcomes.iter().map(|o| o.value.metrics.prompt_tokens).sum();
    let total_completion: u64 = outcomes.iter().map(|o| o.value.metrics.completion_tokens).sum();
    let total_tokens: u64 = outcomes.iter().map(|o| o.value.metrics.total_tokens).sum();
    let max_duration = outcomes
        .iter()
        .map(|o| o.value.metrics.ai_duration_ms)
        .max()
        .unwrap_or(0);
    let model_name = provider_names.join("+");

    let files_changed: usize = outcomes.iter().map(|o| o.value.summary.files_changed).max().unwrap_or(0);
    let edits_count: usize = outcomes.iter().map(|o| o.value.summary.edits_count).sum();
    let adds_count: usize = outcomes.iter().map(|o| o.value.summary.adds_count).sum();
    let deletes_count: usize = outcomes.iter().map(|o| o.value.summary.deletes_count).sum();

    ReviewResult {
        summary: ReviewSummary {
            files_changed,
            edits_count,
            adds_count,
            deletes_count,
            description: format!(
                "[Consensus from {provider_count} providers] {}",
                winning.value.summary.description
            ),
            verdict: worst_verdict,
            verdict_justification: winning.value.summary.verdict_justification.clone(),
        },
        file_reviews,
        inline_comments: merged_comments,
        observations,
        recommended_vote,
        metrics: crate::model::ReviewMetrics {
            model_name,
            prompt_tokens: total_prompt,
            completion_tokens: total_completion,
            total_tokens,
            ai_duration_ms: max_duration,
        },
    }
}

fn file_verdict_rank(v: FileVerdict) -> u8 {
    match v {
        FileVerdict::Clean => 0,
        FileVerdict::Concern => 1,
        FileVerdict::Rejected => 2,
    }
}

/// Comment-merge overlap algorithm (§4.4 "Comment merge (overlap)").
const OVERLAP_TOLERANCE: usize = 3;

fn cluster_and_merge(
    pool: Vec<(String, crate::model::InlineComment)>,
    threshold: usize,
) -> Vec<crate::model::InlineComment> {
    let mut used = vec![false; pool.len()];
    let mut merged = Vec::new();

    for anchor_idx in 0..pool.len() {
        if used[anchor_idx] {
            continue;
        }
        used[anchor_idx] = true;
        let (anchor_provider, anchor_comment) = &pool[anchor_idx];
        let mut cluster_indices = vec![anchor_idx];
        let mut providers_in_cluster = vec![anchor_provider.clone()];

        for other_idx in (anchor_idx + 1)..pool.len() {
            if used[other_idx] {
                continue;
            }
            let (other_provider, other_comment) = &pool[other_idx];
            if other_provider == anchor_provider {
                continue;
            }
            let overlaps = other_comment.path.eq_ignore_ascii_case(&anchor_comment.path)
                && anchor_comment.line_range().within(&other_comment.line_range(), OVERLAP_TOLERANCE);
            if overlaps && !providers_in_cluster.contains(other_provider) {
                used[other_idx] = true;
                cluster_indices.push(other_idx);
                providers_in_cluster.push(other_provider.clone());
            }
        }

        if providers_in_cluster.len() < threshold {
            continue;
        }

        let mut representative = anchor_comment.clone();
        let tag = providers_in_cluster.join("+");
        representative.comment = format!("[{tag}] {}", representative.comment);
        merged.push(representative);
    }

    merged
}

/// Majority verification (§4.4 "Verification majority").
fn merge_verifications(outcomes: Vec<Outcome<Vec<ResolutionVerdict>>>) -> Vec<ResolutionVerdict> {
    let mut by_thread: HashMap<String, Vec<(String, bool, String)>> = HashMap::new();

    for o in &outcomes {
        for v in &o.value {
            by_thread
                .entry(v.thread_id.clone())
                .or_default()
                .push((o.provider.clone(), v.is_fixed, v.reasoning.clone()));
        }
    }

    let mut verdicts: Vec<ResolutionVerdict> = by_thread
        .into_iter()
        .map(|(thread_id, votes)| {
            let fixed_votes = votes.iter().filter(|(_, fixed, _)| *fixed).count();
            let total_votes = votes.len();
            let is_fixed = fixed_votes * 2 > total_votes;
            let per_provider_reasons = votes
                .iter()
                .map(|(provider, fixed, reason)| {
                    let verdict = if *fixed { "fixed" } else { "not fixed" };
                    if reason.is_empty() {
                        format!("{provider}: {verdict}")
                    } else {
                        format!("{provider}: {verdict} ({reason})")
                    }
                })
                .collect::<Vec<_>>()
                .join(" | ");
            ResolutionVerdict {
                thread_id,
                is_fixed,
                reasoning: format!(
                    "Consensus: {fixed_votes}/{total_votes} providers say fixed. {per_provider_reasons}"
                ),
            }
        })
        .collect();
    verdicts.sort_by(|a, b| a.thread_id.cmp(&b.thread_id));
    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommentStatus, InlineComment, LeadIn};

    fn comment(provider: &str, path: &str, start: usize, end: usize) -> (String, InlineComment) {
        (
            provider.to_string(),
            InlineComment {
                path: path.to_string(),
                start_line: start,
                end_line: end,
                lead_in: LeadIn::Concern,
                comment: "looks off".to_string(),
                code_snippet: None,
                status: CommentStatus::Active,
            },
        )
    }

    #[test]
    fn overlapping_comments_from_distinct_providers_merge() {
        let pool = vec![
            comment("ProviderA", "f.rs", 5, 10),
            comment("ProviderB", "f.rs", 6, 11),
        ];
        let merged = cluster_and_merge(pool, 2);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].comment.starts_with("[ProviderA+ProviderB]"));
    }

    #[test]
    fn below_threshold_clusters_are_dropped() {
        let pool = vec![comment("ProviderA", "f.rs", 5, 10)];
        let merged = cluster_and_merge(pool, 2);
        assert!(merged.is_empty());
    }

    #[test]
    fn threshold_one_keeps_every_comment() {
        let pool = vec![
            comment("ProviderA", "f.rs", 5, 10),
            comment("ProviderB", "other.rs", 1, 2),
        ];
        let merged = cluster_and_merge(pool, 1);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn non_overlapping_comments_stay_separate() {
        let pool = vec![
            comment("ProviderA", "f.rs", 5, 10),
            comment("ProviderB", "f.rs", 50, 55),
        ];
        let merged = cluster_and_merge(pool, 1);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn verification_majority_strict() {
        let outcomes = vec![
            Outcome {
                provider: "A".into(),
                value: vec![ResolutionVerdict { thread_id: "t1".into(), is_fixed: true, reasoning: "ok".into() }],
            },
            Outcome {
                provider: "B".into(),
                value: vec![ResolutionVerdict { thread_id: "t1".into(), is_fixed: true, reasoning: "ok".into() }],
            },
            Outcome {
                provider: "C".into(),
                value: vec![ResolutionVerdict { thread_id: "t1".into(), is_fixed: false, reasoning: "no".into() }],
            },
        ];
        let merged = merge_verifications(outcomes);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_fixed);
        assert!(merged[0].reasoning.starts_with("Consensus: 2/3"));
    }
}
