//! OpenAI-compatible chat-completions transport (covers Azure OpenAI and
//! any self-hosted gateway speaking the same wire format). Not present in
//! the teacher, which only ships Ollama; grounded in the same
//! `reqwest`-based request/response shape as `ollama.rs`, generalized to
//! the `/v1/chat/completions` envelope.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::ollama::{Generation, Usage};
use crate::prompt::Prompt;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub async fn generate(cfg: &LlmConfig, prompt: &Prompt) -> Result<Generation, LlmError> {
    let url = format!(
        "{}/v1/chat/completions",
        cfg.endpoint.trim_end_matches('/')
    );
    let req = ChatRequest {
        model: &cfg.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: &prompt.system,
            },
            ChatMessage {
                role: "user",
                content: &prompt.user,
            },
        ],
        temperature: 0.0,
    };

    let client = reqwest::Client::new();
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let mut builder = client.post(&url).json(&req);
        if let Some(key) = &cfg.api_key {
            builder = builder.bearer_auth(key);
        }
        let outcome = builder.send().await;

        match outcome {
            Ok(resp) if resp.status().is_success() => {
                let body: ChatResponse = resp.json().await.map_err(LlmError::Transport)?;
                let usage = body.usage.unwrap_or_default();
                let text = body
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .unwrap_or_default();
                return Ok(Generation {
                    text,
                    duration_ms: start.elapsed().as_millis() as u64,
                    usage: Usage {
                        prompt_tokens: usage.prompt_tokens,
                        completion_tokens: usage.completion_tokens,
                    },
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
                tracing::warn!(provider = %cfg.display_name, attempt, status = status.as_u16(), "openai-compatible call failed, retrying");
            }
            Err(err) => {
                if attempt >= cfg.max_retries {
                    return Err(LlmError::Transport(err));
                }
                tracing::warn!(provider = %cfg.display_name, attempt, error = %err, "openai-compatible transport error, retrying");
            }
        }

        tokio::time::sleep(backoff(attempt)).await;
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(250u64.saturating_mul(1u64 << attempt.min(5)))
}
