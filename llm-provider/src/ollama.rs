//! Concrete Ollama transport (`POST /api/generate`), adapted from the
//! teacher's `OllamaClient` to add retry/backoff and timing (§5).

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::prompt::Prompt;

#[derive(Serialize)]
struct OllamaReq<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResp {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Token accounting for one completion, carried into `ReviewMetrics` (§3).
/// Zero on either side means the backend didn't report that count, not
/// that zero tokens were actually used.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Result of one successful generation: raw text, wall-clock latency, and
/// whatever token usage the backend reported alongside it.
pub struct Generation {
    pub text: String,
    pub duration_ms: u64,
    pub usage: Usage,
}

/// Calls `POST {endpoint}/api/generate`, retrying on transport errors and
/// `429`/`5xx` status with exponential backoff (`max_retries` attempts).
pub async fn generate(cfg: &LlmConfig, prompt: &Prompt) -> Result<Generation, LlmError> {
    let url = format!("{}/api/generate", cfg.endpoint.trim_end_matches('/'));
    let full_prompt = format!("{}\n\n{}", prompt.system, prompt.user);
    let req = OllamaReq {
        model: &cfg.model,
        prompt: full_prompt,
        stream: false,
    };

    let client = reqwest::Client::new();
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let outcome = client.post(&url).json(&req).send().await;

        match outcome {
            Ok(resp) if resp.status().is_success() => {
                let body: OllamaResp = resp.json().await.map_err(LlmError::Transport)?;
                let usage = Usage {
                    prompt_tokens: body.prompt_eval_count.unwrap_or(0),
                    completion_tokens: body.eval_count.unwrap_or(0),
                };
                return Ok(Generation {
                    text: body.response,
                    duration_ms: start.elapsed().as_millis() as u64,
                    usage,
                });
            }
            Ok(resp) => {
                let status = resp.status();
                let retryable = status.as_u16() == 429 || status.is_server_error();
                let body = resp.text().await.unwrap_or_default();
                if !retryable || attempt >= cfg.max_retries {
                    return Err(LlmError::Status {
                        provider: cfg.display_name.clone(),
                        status: status.as_u16(),
                        body,
                    });
                }
                tracing::warn!(provider = %cfg.display_name, attempt, status = status.as_u16(), "ollama call failed, retrying");
            }
            Err(err) => {
                if attempt >= cfg.max_retries {
                    return Err(LlmError::Transport(err));
                }
                tracing::warn!(provider = %cfg.display_name, attempt, error = %err, "ollama transport error, retrying");
            }
        }

        tokio::time::sleep(backoff(attempt)).await;
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(250u64.saturating_mul(1u64 << attempt.min(5)))
}
