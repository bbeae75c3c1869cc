//! Attempt timing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_poll_ms() -> u64 {
    1_050
}

fn default_timeout_secs() -> u64 {
    2 * 24 * 3_600
}

fn default_cancel_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptConfig {
    /// Pause between two condition evaluations while waiting.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Lifetime of an attempt that never fires.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How long a timed-out attempt waits for its cancel to be confirmed.
    #[serde(default = "default_cancel_timeout_secs")]
    pub cancel_timeout_secs: u64,
}

impl Default for AttemptConfig {
    fn default() -> Self {
        Self {
            poll_ms: default_poll_ms(),
            timeout_secs: default_timeout_secs(),
            cancel_timeout_secs: default_cancel_timeout_secs(),
        }
    }
}

impl AttemptConfig {
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_secs(self.cancel_timeout_secs)
    }
}
