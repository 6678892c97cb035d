//! Process-local cooldown table keyed by `(org, project, repo, prId)` (§4.1).
//!
//! The only process-wide mutable state in this crate (§9 "Global state").
//! Backed by a `tokio::sync::RwLock<HashMap<_,_>>` double-checked on the
//! write path, the same concurrent-map shape the retrieved corpus uses for
//! its client cache (`ai-llm-service/src/service_profiles.rs`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

use crate::model::PrKey;

/// Outcome of a `check` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub allowed: bool,
    pub seconds_remaining: u64,
}

/// Every ~100 calls, a stale sweep drops entries older than this.
const EVICTION_STALE_SECS: u64 = 24 * 3600;
const EVICTION_PERIOD: u64 = 100;

pub struct RateGate {
    entries: RwLock<HashMap<PrKey, u64>>,
    calls: AtomicU64,
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RateGate {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// `check(K, intervalMinutes)` (§4.1). `interval_minutes <= 0` always allows.
    pub async fn check(&self, key: &PrKey, interval_minutes: i64) -> CheckOutcome {
        if interval_minutes <= 0 {
            return CheckOutcome {
                allowed: true,
                seconds_remaining: 0,
            };
        }
        let key = key.normalized();
        let now = now_secs();
        let interval = interval_minutes as u64 * 60;

        self.maybe_evict().await;

        let last = self.entries.read().await.get(&key).copied();
        match last {
            Some(last_at) if now.saturating_sub(last_at) < interval => {
                let elapsed = now.saturating_sub(last_at);
                CheckOutcome {
                    allowed: false,
                    seconds_remaining: interval.saturating_sub(elapsed),
                }
            }
            _ => CheckOutcome {
                allowed: true,
                seconds_remaining: 0,
            },
        }
    }

    /// `record(K)` (§4.1): `K -> now`.
    pub async fn record(&self, key: &PrKey) {
        let key = key.normalized();
        let now = now_secs();
        self.entries.write().await.insert(key, now);
    }

    /// Probabilistic eviction: every ~100 calls, drop entries older than 24h.
    async fn maybe_evict(&self) {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if n % EVICTION_PERIOD != 0 {
            return;
        }
        let now = now_secs();
        let mut guard = self.entries.write().await;
        guard.retain(|_, at| now.saturating_sub(*at) < EVICTION_STALE_SECS);
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(pr: i64) -> PrKey {
        PrKey {
            org: "Org".into(),
            project: "Proj".into(),
            repo: "Repo".into(),
            pr_id: pr,
        }
    }

    #[tokio::test]
    async fn non_positive_interval_always_allows() {
        let gate = RateGate::new();
        gate.record(&key(1)).await;
        let outcome = gate.check(&key(1), 0).await;
        assert!(outcome.allowed);
    }

    #[tokio::test]
    async fn fresh_key_is_allowed() {
        let gate = RateGate::new();
        let outcome = gate.check(&key(1), 5).await;
        assert!(outcome.allowed);
    }

    #[tokio::test]
    async fn recorded_key_is_denied_within_interval() {
        let gate = RateGate::new();
        gate.record(&key(1)).await;
        let outcome = gate.check(&key(1), 5).await;
        assert!(!outcome.allowed);
        assert!(outcome.seconds_remaining <= 300);
    }

    #[tokio::test]
    async fn key_normalization_is_case_insensitive() {
        let gate = RateGate::new();
        gate.record(&key(1)).await;
        let mixed_case = PrKey {
            org: "org".into(),
            project: "proj".into(),
            repo: "repo".into(),
            pr_id: 1,
        };
        let outcome = gate.check(&mixed_case, 5).await;
        assert!(!outcome.allowed);
    }

    #[tokio::test]
    async fn different_pr_ids_are_independent() {
        let gate = RateGate::new();
        gate.record(&key(1)).await;
        let outcome = gate.check(&key(2), 5).await;
        assert!(outcome.allowed);
    }
}
