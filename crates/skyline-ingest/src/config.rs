use serde::{Deserialize, Serialize};
use skyline_protocol::DecodeLimits;
use skyline_store::CarLimits;

use crate::backoff::BackoffConfig;

/// `[firehose]` section of the configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Relay host (`wss://bsky.network`) or full `subscribeRepos` URL.
    pub relay_url: String,
    /// Sequence number to resume after on the first connection.
    pub cursor: Option<i64>,
    pub backoff: BackoffConfig,
    /// Commits buffered between decoding and the index worker.
    pub queue_capacity: usize,
    pub limits: DecodeLimits,
    pub car: CarLimits,
    /// Consecutive frame or upstream failures at one cursor before giving
    /// up. `0` retries forever.
    pub max_stalled_reconnects: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            relay_url: "wss://bsky.network".into(),
            cursor: None,
            backoff: BackoffConfig::default(),
            queue_capacity: 256,
            limits: DecodeLimits::default(),
            car: CarLimits::default(),
            max_stalled_reconnects: 5,
        }
    }
}
