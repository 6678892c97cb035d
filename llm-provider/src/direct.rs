//! `DirectProvider`: the concrete, single-backend `ProviderPort` (§4.3),
//! enum-dispatching over `LlmKind` the same way the teacher's `LlmClient`
//! dispatches over its own `LlmKind` (`mr-reviewer/src/review/llm.rs`).

use review_core::model::{FileChange, PullRequestSnapshot, ReviewResult};
use review_core::provider::{ProviderPort, ResolutionCandidate, ResolutionVerdict};

use crate::config::{LlmConfig, LlmKind};
use crate::ollama;
use crate::openai;
use crate::parse;
use crate::prompt;

/// One configured provider-registry entry, ready to be driven through the
/// `ProviderPort` contract.
pub struct DirectProvider {
    cfg: LlmConfig,
}

impl DirectProvider {
    pub fn new(cfg: LlmConfig) -> Self {
        Self { cfg }
    }

    async fn generate(&self, p: &prompt::Prompt) -> anyhow::Result<ollama::Generation> {
        let generation = match self.cfg.kind {
            LlmKind::Ollama => ollama::generate(&self.cfg, p).await,
            LlmKind::OpenAiCompatible => openai::generate(&self.cfg, p).await,
        }?;
        Ok(generation)
    }
}

impl ProviderPort for DirectProvider {
    fn name(&self) -> &str {
        &self.cfg.display_name
    }

    async fn review_all(
        &self,
        pr: &PullRequestSnapshot,
        files: &[FileChange],
    ) -> anyhow::Result<ReviewResult> {
        let p = prompt::review_all_prompt(pr, files, self.cfg.custom_instructions.as_deref());
        let generation = self.generate(&p).await?;
        let result = parse::parse_review_result(&generation.text, &self.cfg.model, generation.duration_ms, generation.usage)?;
        Ok(result)
    }

    async fn review_one(
        &self,
        pr: &PullRequestSnapshot,
        file: &FileChange,
        total_files_in_pr: usize,
    ) -> anyhow::Result<ReviewResult> {
        let p = prompt::review_one_prompt(pr, file, total_files_in_pr, self.cfg.custom_instructions.as_deref());
        let generation = self.generate(&p).await?;
        let result = parse::parse_review_result(&generation.text, &self.cfg.model, generation.duration_ms, generation.usage)?;
        Ok(result)
    }

    async fn verify_resolutions(
        &self,
        candidates: &[ResolutionCandidate],
    ) -> anyhow::Result<Vec<ResolutionVerdict>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let p = prompt::verify_resolutions_prompt(candidates);
        let generation = self.generate(&p).await?;
        Ok(parse::parse_verification(&generation.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_the_configured_name() {
        let cfg = LlmConfig {
            display_name: "ollama-primary".to_string(),
            ..LlmConfig::default()
        };
        let provider = DirectProvider::new(cfg);
        assert_eq!(provider.name(), "ollama-primary");
    }
}
