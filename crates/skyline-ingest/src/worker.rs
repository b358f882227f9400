use skyline_index::{IndexWriter, PostRow};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{IngestError, IngestResult};

/// Rows recovered from one commit, written as one unit.
#[derive(Clone, Debug)]
pub struct IndexBatch {
    pub seq: i64,
    pub rows: Vec<PostRow>,
}

/// Totals reported by the worker when it stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub batches: u64,
    pub inserted: u64,
    pub already_indexed: u64,
}

/// The single writer draining the commit queue.
///
/// Runs on a blocking thread so SQLite calls and retry sleeps never stall
/// the runtime. Batches are written strictly in queue order.
#[derive(Debug)]
pub struct IndexWorker {
    handle: JoinHandle<IngestResult<WorkerStats>>,
}

impl IndexWorker {
    /// Start the worker behind a queue of `capacity` batches.
    pub fn spawn(writer: IndexWriter, capacity: usize) -> (mpsc::Sender<IndexBatch>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::task::spawn_blocking(move || drain(writer, rx));
        (tx, Self { handle })
    }

    /// Wait for the worker to finish. It stops once every sender is dropped
    /// and the queue is empty, or at the first write failure.
    pub async fn join(self) -> IngestResult<WorkerStats> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "index worker panicked");
                Err(IngestError::WorkerStopped)
            }
        }
    }
}

fn drain(writer: IndexWriter, mut rx: mpsc::Receiver<IndexBatch>) -> IngestResult<WorkerStats> {
    let mut stats = WorkerStats::default();
    while let Some(batch) = rx.blocking_recv() {
        let outcome = match writer.write_batch(&batch.rows) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(seq = batch.seq, rows = batch.rows.len(), error = %e, "index write failed");
                return Err(e.into());
            }
        };
        debug!(
            seq = batch.seq,
            inserted = outcome.inserted,
            already_indexed = outcome.already_indexed,
            "batch indexed"
        );
        stats.batches += 1;
        stats.inserted += outcome.inserted as u64;
        stats.already_indexed += outcome.already_indexed as u64;
    }
    info!(
        batches = stats.batches,
        inserted = stats.inserted,
        "index worker drained"
    );
    Ok(stats)
}
