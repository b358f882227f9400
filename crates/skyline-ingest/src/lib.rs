//! Firehose ingestion for Skyline.
//!
//! Subscribes to `com.atproto.sync.subscribeRepos`, decodes each frame,
//! resolves the records created by every commit from the blocks shipped with
//! it, and hands the resulting post rows to a single index worker.
//!
//! # Key Types
//!
//! - [`Ingestor`] -- the connection loop: reconnect, backoff, shutdown
//! - [`CommitInterpreter`] -- commit event to post rows
//! - [`SequenceTracker`] -- replay detection and the resume cursor
//! - [`IndexWorker`] -- blocking writer behind a bounded queue
//! - [`Connector`] / [`FrameSource`] -- transport seam, [`WebSocketConnector`] in production

pub mod backoff;
pub mod config;
pub mod error;
pub mod ingestor;
pub mod interpret;
pub mod sequence;
pub mod transport;
pub mod worker;

pub use backoff::{Backoff, BackoffConfig};
pub use config::IngestConfig;
pub use error::{CommitSkip, Disposition, IngestError, IngestResult, OpSkip};
pub use ingestor::{IngestReport, IngestStats, Ingestor};
pub use interpret::{CommitInterpreter, Interpretation, OpStats};
pub use sequence::{SeqCheck, SequenceTracker};
pub use transport::{Connector, FrameSource, WebSocketConnector};
pub use worker::{IndexBatch, IndexWorker, WorkerStats};
