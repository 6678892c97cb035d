//! Errors raised by this crate's transport and parsing layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider {provider} returned an error status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("could not parse provider output as a review: {detail}")]
    Unparseable { detail: String },

    #[error("exhausted {retries} retries against {provider}")]
    RetriesExhausted { provider: String, retries: u32 },
}
