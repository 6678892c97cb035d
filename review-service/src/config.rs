//! Environment-derived configuration (§4.8 of SPEC_FULL.md).
//!
//! Mirrors the retrieved corpus's `ai-llm-service/src/config` pattern: small
//! `must_env`/`env_opt_*` helpers feeding typed constructors, rather than a
//! general-purpose config crate. Nothing here talks to the network; it only
//! reads `std::env` (after `main` has loaded an optional `.env` via `dotenvy`).

use std::time::Duration;

use llm_provider::config::{LlmConfig, LlmKind};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while assembling `AppConfig` from the process environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("environment variable {var} is not a valid number: {reason}")]
    InvalidNumber { var: &'static str, reason: String },

    #[error("environment variable {var} has invalid format: {reason}")]
    InvalidFormat { var: &'static str, reason: String },

    #[error("unknown provider type {0:?} in AI_REVIEW_PROVIDERS_JSON")]
    UnknownProviderType(String),

    #[error("AI_REVIEW_PROVIDERS_JSON is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("no enabled provider configured (AI_REVIEW_PROVIDERS_JSON is empty or every entry has enabled=false)")]
    NoProviderConfigured,
}

type Result<T> = std::result::Result<T, ConfigError>;

fn must_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn env_or(name: &'static str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_u32(name: &'static str, default: u32) -> Result<u32> {
    match env_opt(name) {
        Some(v) => v.parse::<u32>().map_err(|e| ConfigError::InvalidNumber {
            var: name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn env_i64(name: &'static str, default: i64) -> Result<i64> {
    match env_opt(name) {
        Some(v) => v.parse::<i64>().map_err(|e| ConfigError::InvalidNumber {
            var: name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool_str(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(name: &'static str, default: bool) -> Result<bool> {
    match env_opt(name) {
        Some(v) => parse_bool_str(&v).ok_or_else(|| ConfigError::InvalidFormat {
            var: name,
            reason: format!("expected a boolean, got {v:?}"),
        }),
        None => Ok(default),
    }
}

/// Azure DevOps organization and auth (§4.10).
#[derive(Debug, Clone)]
pub struct AzureDevOpsConfig {
    pub organization: String,
    pub personal_access_token: String,
    pub api_version: String,
}

impl AzureDevOpsConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            organization: must_env("AZURE_DEVOPS_ORG")?,
            personal_access_token: must_env("AZURE_DEVOPS_PAT")?,
            api_version: env_or("AZURE_DEVOPS_API_VERSION", "7.1"),
        })
    }
}

/// Dispatch mode between a single provider and the Consensus Aggregator (§9
/// "Orchestration-level options").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationMode {
    Single,
    Consensus,
}

/// One entry of the JSON array in `AI_REVIEW_PROVIDERS_JSON` (§9 "Provider registry").
#[derive(Debug, Clone, Deserialize)]
struct ProviderEntryRaw {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "displayName")]
    display_name: String,
    endpoint: String,
    #[serde(rename = "apiKey", default)]
    api_key: Option<String>,
    model: String,
    #[serde(rename = "customInstructionsPath", default)]
    custom_instructions_path: Option<String>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(rename = "maxRetries", default = "default_max_retries")]
    max_retries: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

/// Fully-resolved provider registry plus the orchestration-level knobs that
/// govern how its entries are combined (§9).
#[derive(Debug, Clone)]
pub struct ProviderRegistryConfig {
    pub providers: Vec<LlmConfig>,
    pub mode: OrchestrationMode,
    pub active_provider: Option<String>,
    pub consensus_threshold: usize,
    pub max_parallel_reviews: usize,
}

impl ProviderRegistryConfig {
    fn from_env() -> Result<Self> {
        let raw_json = must_env("AI_REVIEW_PROVIDERS_JSON")?;
        let entries: Vec<ProviderEntryRaw> = serde_json::from_str(&raw_json)?;

        let mut providers = Vec::with_capacity(entries.len());
        for entry in entries.into_iter().filter(|e| e.enabled) {
            let kind = LlmKind::from_tag(&entry.kind)
                .ok_or_else(|| ConfigError::UnknownProviderType(entry.kind.clone()))?;
            let custom_instructions = match &entry.custom_instructions_path {
                Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::InvalidFormat {
                        var: "AI_REVIEW_PROVIDERS_JSON",
                        reason: format!("could not read customInstructionsPath {path:?}: {e}"),
                    }
                })?),
                None => None,
            };
            providers.push(LlmConfig {
                kind,
                display_name: entry.display_name,
                endpoint: entry.endpoint,
                api_key: entry.api_key,
                model: entry.model,
                custom_instructions,
                max_retries: entry.max_retries,
            });
        }

        if providers.is_empty() {
            return Err(ConfigError::NoProviderConfigured);
        }

        let mode = match env_or("AI_REVIEW_MODE", "single").to_ascii_lowercase().as_str() {
            "consensus" => OrchestrationMode::Consensus,
            _ => OrchestrationMode::Single,
        };

        let consensus_threshold = env_u32("AI_REVIEW_CONSENSUS_THRESHOLD", 1)? as usize;
        let max_parallel_reviews = env_u32("AI_REVIEW_MAX_PARALLEL", 5)? as usize;
        let active_provider = env_opt("AI_REVIEW_ACTIVE_PROVIDER");

        Ok(Self {
            providers,
            mode,
            active_provider,
            consensus_threshold,
            max_parallel_reviews,
        })
    }
}

/// `RateGateConfig` (§4.1, §4.8).
#[derive(Debug, Clone, Copy)]
pub struct RateGateConfig {
    pub interval_minutes: i64,
}

/// Top-level configuration assembled once at startup and shared (as `Arc`)
/// across every request.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub azure_devops: AzureDevOpsConfig,
    pub providers: ProviderRegistryConfig,
    pub rate_gate: RateGateConfig,
    pub attribution_tag: String,
    pub add_reviewer_vote: bool,
    pub resolve_prior_threads: bool,
    pub trigger_secret: String,
    pub bind_addr: String,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let rate_gate_interval = env_i64("AI_REVIEW_RATE_GATE_INTERVAL_MINUTES", 5)?;
        Ok(Self {
            azure_devops: AzureDevOpsConfig::from_env()?,
            providers: ProviderRegistryConfig::from_env()?,
            rate_gate: RateGateConfig {
                interval_minutes: rate_gate_interval,
            },
            attribution_tag: env_or("AI_REVIEW_ATTRIBUTION_TAG", "ai-code-review"),
            add_reviewer_vote: env_bool("AI_REVIEW_ADD_REVIEWER_VOTE", true)?,
            resolve_prior_threads: env_bool("AI_REVIEW_RESOLVE_PRIOR_THREADS", true)?,
            trigger_secret: must_env("TRIGGER_SECRET")?,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            http_timeout: Duration::from_secs(env_u32("AI_REVIEW_HTTP_TIMEOUT_SECS", 30)? as u64),
        })
    }

    pub fn orchestrator_config(&self) -> review_core::orchestrator::OrchestratorConfig {
        review_core::orchestrator::OrchestratorConfig {
            rate_gate_interval_minutes: self.rate_gate.interval_minutes,
            max_parallel_reviews: self.providers.max_parallel_reviews,
            add_reviewer_vote: self.add_reviewer_vote,
            attribution_tag: self.attribution_tag.clone(),
            resolve_prior_threads: self.resolve_prior_threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_str_accepts_common_spellings() {
        assert_eq!(parse_bool_str("true"), Some(true));
        assert_eq!(parse_bool_str("YES"), Some(true));
        assert_eq!(parse_bool_str("on"), Some(true));
        assert_eq!(parse_bool_str("0"), Some(false));
        assert_eq!(parse_bool_str("False"), Some(false));
        assert_eq!(parse_bool_str("off"), Some(false));
        assert_eq!(parse_bool_str("maybe"), None);
    }

    #[test]
    fn provider_entry_raw_defaults_enabled_and_max_retries() {
        let json = r#"{
            "type": "ollama",
            "displayName": "local",
            "endpoint": "http://127.0.0.1:11434",
            "model": "codellama"
        }"#;
        let entry: ProviderEntryRaw = serde_json::from_str(json).unwrap();
        assert!(entry.enabled);
        assert_eq!(entry.max_retries, 3);
        assert_eq!(entry.api_key, None);
        assert_eq!(entry.custom_instructions_path, None);
    }

    #[test]
    fn provider_entry_raw_honors_explicit_fields() {
        let json = r#"{
            "type": "openai-compatible",
            "displayName": "gpt",
            "endpoint": "https://api.openai.com/v1",
            "apiKey": "sk-test",
            "model": "gpt-4o",
            "enabled": false,
            "maxRetries": 7
        }"#;
        let entry: ProviderEntryRaw = serde_json::from_str(json).unwrap();
        assert!(!entry.enabled);
        assert_eq!(entry.max_retries, 7);
        assert_eq!(entry.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn unknown_provider_type_is_rejected() {
        assert!(LlmKind::from_tag("carrier-pigeon").is_none());
    }
}
