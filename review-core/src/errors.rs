//! Error taxonomy for the `ReviewStateStore` collaborator (§7).
//!
//! The orchestrator's top-level entry point distinguishes exactly one thing
//! about an I/O failure on a primary-path call: whether the platform itself
//! rate-limited the request. `StateStoreError::RateLimited` surfaces as
//! `RunOutcome::RateLimited` so the caller can reschedule instead of seeing
//! a permanent-looking fatal error; every other failure on those calls is
//! fatal (§7 "Fatal ... catastrophic State Store failure"). Peripheral-call
//! failures (posting a thread, casting a vote, updating the description,
//! adding the review tag) are always logged and swallowed regardless of
//! their specific cause, matching §7's "Recoverable peripheral" policy, so
//! they never need to inspect this taxonomy at all.

use thiserror::Error;

/// Failures talking to the platform-side `ReviewStateStore` collaborator.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited by platform, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("platform returned server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("malformed platform response: {0}")]
    Malformed(String),
}

impl StateStoreError {
    /// Maps an HTTP status code onto the corresponding variant, the same
    /// convention the teacher's GitLab client uses for its own API errors.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 => StateStoreError::Unauthorized,
            403 => StateStoreError::Forbidden,
            404 => StateStoreError::NotFound(body.into()),
            429 => StateStoreError::RateLimited {
                retry_after_secs: 60,
            },
            500..=599 => StateStoreError::Server {
                status,
                body: body.into(),
            },
            _ => StateStoreError::Malformed(body.into()),
        }
    }

    /// Extracts a rate-limit retry hint from an arbitrary call failure, if
    /// the error chain carries one. Used at the orchestrator's primary-path
    /// I/O boundaries to tell a platform 429 apart from a genuinely fatal
    /// failure (§7).
    pub fn retry_after_secs(err: &anyhow::Error) -> Option<u64> {
        err.downcast_ref::<StateStoreError>().and_then(|e| match e {
            StateStoreError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_maps_429_to_rate_limited() {
        let err = StateStoreError::from_status(429, "slow down");
        assert!(matches!(err, StateStoreError::RateLimited { .. }));
    }

    #[test]
    fn retry_after_secs_recovers_the_hint_through_anyhow() {
        let wrapped: anyhow::Error = StateStoreError::from_status(429, "slow down").into();
        assert_eq!(StateStoreError::retry_after_secs(&wrapped), Some(60));
    }

    #[test]
    fn retry_after_secs_is_none_for_other_failures() {
        let wrapped: anyhow::Error = StateStoreError::from_status(500, "boom").into();
        assert_eq!(StateStoreError::retry_after_secs(&wrapped), None);
    }
}
