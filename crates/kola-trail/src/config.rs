//! Trailing stop configuration.

use crate::error::{TrailError, TrailResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_tail_pct() -> f64 {
    0.5
}

fn default_time_bin_secs() -> u64 {
    361
}

fn default_update_pause_ms() -> u64 {
    200
}

fn default_jitter_span_ms() -> u64 {
    4_000
}

fn default_log_pause_secs() -> u64 {
    60
}

fn default_min_flex() -> f64 {
    0.2
}

fn default_max_variation() -> f64 {
    5.0
}

fn default_histogram_points() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailConfig {
    /// Distance of the reference tail from the reference price, in percent.
    #[serde(default = "default_tail_pct")]
    pub tail_pct: f64,
    /// Width of each variation window.
    #[serde(default = "default_time_bin_secs")]
    pub time_bin_secs: u64,
    /// Mean pause between two updates.
    #[serde(default = "default_update_pause_ms")]
    pub update_pause_ms: u64,
    /// Total width of the uniform jitter added around `update_pause_ms`.
    #[serde(default = "default_jitter_span_ms")]
    pub jitter_span_ms: u64,
    #[serde(default = "default_log_pause_secs")]
    pub log_pause_secs: u64,
    /// Lowest scale the flexible tail can shrink to, in `(0, 1]`.
    #[serde(default = "default_min_flex")]
    pub min_flex: f64,
    /// Largest variation (percent) the reference histogram spans.
    #[serde(default = "default_max_variation")]
    pub max_variation: f64,
    #[serde(default = "default_histogram_points")]
    pub histogram_points: usize,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            tail_pct: default_tail_pct(),
            time_bin_secs: default_time_bin_secs(),
            update_pause_ms: default_update_pause_ms(),
            jitter_span_ms: default_jitter_span_ms(),
            log_pause_secs: default_log_pause_secs(),
            min_flex: default_min_flex(),
            max_variation: default_max_variation(),
            histogram_points: default_histogram_points(),
        }
    }
}

impl TrailConfig {
    pub fn validate(&self) -> TrailResult<()> {
        if !(self.tail_pct > 0.0 && self.tail_pct < 100.0) {
            return Err(TrailError::InvalidConfig(format!(
                "tail_pct must be in (0, 100), got {}",
                self.tail_pct
            )));
        }
        if !(self.min_flex > 0.0 && self.min_flex <= 1.0) {
            return Err(TrailError::InvalidConfig(format!(
                "min_flex must be in (0, 1], got {}",
                self.min_flex
            )));
        }
        if self.max_variation <= 1.0 {
            return Err(TrailError::InvalidConfig(format!(
                "max_variation must exceed 1, got {}",
                self.max_variation
            )));
        }
        if self.histogram_points < 2 {
            return Err(TrailError::InvalidConfig(
                "histogram_points must be at least 2".to_string(),
            ));
        }
        if self.time_bin_secs == 0 || self.update_pause_ms == 0 {
            return Err(TrailError::InvalidConfig(
                "time_bin_secs and update_pause_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn time_bin(&self) -> Duration {
        Duration::from_secs(self.time_bin_secs)
    }

    pub fn log_pause(&self) -> Duration {
        Duration::from_secs(self.log_pause_secs)
    }

    /// Samples kept: four variation windows worth of updates.
    pub fn ring_capacity(&self) -> usize {
        let per_bin = (self.time_bin_secs * 1_000) / self.update_pause_ms;
        (per_bin as usize * 4).max(3)
    }

    /// `update_pause + U(0, jitter_span) - jitter_span / 2`, clamped at zero.
    pub fn jittered_pause(&self, unit: f64) -> Duration {
        let span = self.jitter_span_ms as f64;
        let ms = self.update_pause_ms as f64 + unit.clamp(0.0, 1.0) * span - span / 2.0;
        Duration::from_millis(ms.max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_capacity() {
        let config = TrailConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ring_capacity(), 361 * 5 * 4);
    }

    #[test]
    fn test_jittered_pause_is_clamped() {
        let config = TrailConfig::default();
        assert_eq!(config.jittered_pause(0.0), Duration::ZERO);
        assert_eq!(config.jittered_pause(1.0), Duration::from_millis(2_200));
        assert_eq!(config.jittered_pause(0.5), Duration::from_millis(200));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = TrailConfig {
            min_flex: 0.0,
            ..TrailConfig::default()
        };
        assert!(config.validate().is_err());

        let config: TrailConfig = serde_json::from_str(r#"{"max_variation": 0.5}"#).unwrap();
        assert!(config.validate().is_err());
    }
}
