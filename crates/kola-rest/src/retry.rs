//! Tiered retry backoff.
//!
//! Every retry sleeps a base jitter. Past `mid_after` attempts a larger
//! jitter is added, past `high_after` a larger one again.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Inclusive millisecond range a jitter is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl JitterRange {
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    fn sample_ms(&self) -> u64 {
        if self.max_ms <= self.min_ms {
            return self.min_ms;
        }
        rand::thread_rng().gen_range(self.min_ms..=self.max_ms)
    }
}

fn default_max_retries() -> u32 {
    30
}

fn default_base() -> JitterRange {
    JitterRange::new(1_000, 2_000)
}

fn default_mid_after() -> u32 {
    3
}

fn default_mid() -> JitterRange {
    JitterRange::new(4_000, 10_000)
}

fn default_high_after() -> u32 {
    6
}

fn default_high() -> JitterRange {
    JitterRange::new(20_000, 80_000)
}

/// Retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base")]
    pub base: JitterRange,
    #[serde(default = "default_mid_after")]
    pub mid_after: u32,
    #[serde(default = "default_mid")]
    pub mid: JitterRange,
    #[serde(default = "default_high_after")]
    pub high_after: u32,
    #[serde(default = "default_high")]
    pub high: JitterRange,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base: default_base(),
            mid_after: default_mid_after(),
            mid: default_mid(),
            high_after: default_high_after(),
            high: default_high(),
        }
    }
}

impl RetryPolicy {
    /// Same tiers, no sleeping.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base: JitterRange::ZERO,
            mid: JitterRange::ZERO,
            high: JitterRange::ZERO,
            ..Self::default()
        }
    }

    /// Sleep before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut ms = self.base.sample_ms();
        if attempt > self.mid_after {
            ms += self.mid.sample_ms();
        }
        if attempt > self.high_after {
            ms += self.high.sample_ms();
        }
        Duration::from_millis(ms)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_retries
    }
}

/// Attempt counter shared by every call of one client.
#[derive(Debug, Default)]
pub struct RetryState {
    attempts: AtomicU32,
}

impl RetryState {
    /// Count a failure, returning the new attempt number.
    pub fn record_failure(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset(&self) {
        self.attempts.store(0, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_tiers() {
        let policy = RetryPolicy::default();
        for _ in 0..20 {
            let first = policy.delay_for(1).as_millis() as u64;
            assert!((1_000..=2_000).contains(&first));

            let fourth = policy.delay_for(4).as_millis() as u64;
            assert!((5_000..=12_000).contains(&fourth));

            let seventh = policy.delay_for(7).as_millis() as u64;
            assert!((25_000..=92_000).contains(&seventh));
        }
    }

    #[test]
    fn test_immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(5);
        assert_eq!(policy.delay_for(10), Duration::ZERO);
        assert!(!policy.exhausted(5));
        assert!(policy.exhausted(6));
    }

    #[test]
    fn test_retry_state_resets() {
        let state = RetryState::default();
        assert_eq!(state.record_failure(), 1);
        assert_eq!(state.record_failure(), 2);
        state.reset();
        assert_eq!(state.attempts(), 0);
    }

    #[test]
    fn test_policy_from_partial_toml_like_json() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_retries": 4}"#).unwrap();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.high, JitterRange::new(20_000, 80_000));
    }
}
