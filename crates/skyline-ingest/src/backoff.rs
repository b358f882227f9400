use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconnect delay schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 30_000,
            factor: 2.0,
        }
    }
}

/// Exponential backoff between reconnect attempts.
///
/// The schedule restarts from `initial_ms` once a connection delivers a
/// frame.
#[derive(Clone, Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before the next attempt; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let factor = self.config.factor.max(1.0);
        let exp = i32::try_from(self.attempt).unwrap_or(i32::MAX);
        let ms = (self.config.initial_ms as f64 * factor.powi(exp)).min(self.config.max_ms as f64);
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(ms as u64)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
