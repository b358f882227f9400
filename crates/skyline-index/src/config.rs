use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::writer::RetryPolicy;

/// `[storage]` section of the configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file; created on first open.
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("skyline.db"),
            busy_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
