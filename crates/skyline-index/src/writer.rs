use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{IndexError, IndexResult};
use crate::row::{InsertOutcome, PostRow};
use crate::traits::PostIndex;

/// Retry budget for transient storage failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 50,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u64 << attempt.saturating_sub(1).min(31);
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

/// Counts for one written batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub already_indexed: usize,
}

/// Blocking batch writer with retry of transient failures.
///
/// Runs on a blocking thread; every call may sleep between attempts.
#[derive(Clone)]
pub struct IndexWriter {
    index: Arc<dyn PostIndex>,
    policy: RetryPolicy,
}

impl IndexWriter {
    pub fn new(index: Arc<dyn PostIndex>, policy: RetryPolicy) -> Self {
        Self { index, policy }
    }

    pub fn index(&self) -> &Arc<dyn PostIndex> {
        &self.index
    }

    /// Write `rows` as one batch.
    ///
    /// Busy/locked failures are retried with backoff up to the policy's
    /// attempt budget; any other failure is returned immediately.
    pub fn write_batch(&self, rows: &[PostRow]) -> IndexResult<BatchOutcome> {
        if rows.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        let outcomes = loop {
            match self.index.insert_batch(rows) {
                Ok(outcomes) => break outcomes,
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "index busy, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    return Err(IndexError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        };

        let mut outcome = BatchOutcome::default();
        for (row, result) in rows.iter().zip(outcomes) {
            match result {
                InsertOutcome::Inserted => {
                    debug!(uri = %row.uri, text = %row.text, "new post");
                    outcome.inserted += 1;
                }
                InsertOutcome::AlreadyIndexed => outcome.already_indexed += 1,
            }
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
