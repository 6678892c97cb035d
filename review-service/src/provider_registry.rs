//! Assembles the process's `ProviderPort` from `AppConfig`'s provider
//! registry (§9 "Provider registry", §9 "Dynamic dispatch on providers").
//!
//! `Provider` is the closed, enum-dispatched set `review-core`'s `lib.rs`
//! doc comment promises: a direct LLM client, or the Consensus Aggregator
//! wrapping several. No `Box<dyn ProviderPort>` anywhere in this workspace.

use llm_provider::DirectProvider;
use review_core::consensus::ConsensusAggregator;
use review_core::model::{FileChange, PullRequestSnapshot, ReviewResult};
use review_core::provider::{ProviderPort, ResolutionCandidate, ResolutionVerdict};

use crate::config::{AppConfig, OrchestrationMode};

pub enum Provider {
    Single(DirectProvider),
    Consensus {
        display_name: String,
        aggregator: ConsensusAggregator<DirectProvider>,
    },
}

impl ProviderPort for Provider {
    fn name(&self) -> &str {
        match self {
            Provider::Single(p) => p.name(),
            Provider::Consensus { display_name, .. } => display_name,
        }
    }

    async fn review_all(
        &self,
        pr: &PullRequestSnapshot,
        files: &[FileChange],
    ) -> anyhow::Result<ReviewResult> {
        match self {
            Provider::Single(p) => p.review_all(pr, files).await,
            Provider::Consensus { aggregator, .. } => aggregator.review_all(pr, files).await,
        }
    }

    async fn review_one(
        &self,
        pr: &PullRequestSnapshot,
        file: &FileChange,
        total_files_in_pr: usize,
    ) -> anyhow::Result<ReviewResult> {
        match self {
            Provider::Single(p) => p.review_one(pr, file, total_files_in_pr).await,
            Provider::Consensus { aggregator, .. } => {
                aggregator.review_one(pr, file, total_files_in_pr).await
            }
        }
    }

    async fn verify_resolutions(
        &self,
        candidates: &[ResolutionCandidate],
    ) -> anyhow::Result<Vec<ResolutionVerdict>> {
        match self {
            Provider::Single(p) => p.verify_resolutions(candidates).await,
            Provider::Consensus { aggregator, .. } => {
                aggregator.verify_resolutions(candidates).await
            }
        }
    }
}

/// Builds the `Provider` this process will drive, per `cfg.providers.mode`.
///
/// `single` mode picks `active_provider` by display name (falling back to
/// the registry's first entry if unset); `consensus` mode wraps every
/// enabled entry behind a `ConsensusAggregator` at `consensus_threshold`.
pub fn build(cfg: &AppConfig) -> anyhow::Result<Provider> {
    let registry = &cfg.providers;
    match registry.mode {
        OrchestrationMode::Single => {
            let chosen = match &registry.active_provider {
                Some(name) => registry
                    .providers
                    .iter()
                    .find(|p| &p.display_name == name)
                    .ok_or_else(|| {
                        anyhow::anyhow!("AI_REVIEW_ACTIVE_PROVIDER {name:?} not found in provider registry")
                    })?,
                None => registry
                    .providers
                    .first()
                    .ok_or_else(|| anyhow::anyhow!("no provider configured"))?,
            };
            Ok(Provider::Single(DirectProvider::new(chosen.clone())))
        }
        OrchestrationMode::Consensus => {
            let display_name = registry
                .providers
                .iter()
                .map(|p| p.display_name.as_str())
                .collect::<Vec<_>>()
                .join("+");
            let providers = registry
                .providers
                .iter()
                .cloned()
                .map(DirectProvider::new)
                .collect();
            Ok(Provider::Consensus {
                display_name,
                aggregator: ConsensusAggregator::new(providers, registry.consensus_threshold),
            })
        }
    }
}
