use skyline_index::IndexWriter;
use skyline_protocol::{CommitEvent, Frame, FrameCodec};
use skyline_types::now_timestamp;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use crate::backoff::Backoff;
use crate::config::IngestConfig;
use crate::error::{Disposition, IngestError, IngestResult};
use crate::interpret::{CommitInterpreter, OpStats};
use crate::sequence::SequenceTracker;
use crate::transport::{Connector, FrameSource};
use crate::worker::{IndexBatch, IndexWorker, WorkerStats};

/// Counters kept by the ingestion loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub connections: u64,
    pub frames: u64,
    pub commits: u64,
    pub replays: u64,
    pub skipped_commits: u64,
    pub upstream_errors: u64,
    pub ops: OpStats,
}

/// Outcome of a completed run.
#[derive(Clone, Copy, Debug)]
pub struct IngestReport {
    pub stats: IngestStats,
    pub written: WorkerStats,
    /// Last processed sequence number.
    pub cursor: Option<i64>,
}

enum ConnectionEnd {
    Shutdown,
    Closed,
}

/// The ingestion loop: one connection at a time, frames processed in order.
///
/// Connection-level failures reconnect with backoff from the last processed
/// sequence number. Storage failures end the run.
pub struct Ingestor<C> {
    connector: C,
    codec: FrameCodec,
    interpreter: CommitInterpreter,
    tracker: SequenceTracker,
    backoff: Backoff,
    queue_capacity: usize,
    max_stalled_reconnects: u32,
    stats: IngestStats,
}

/// Consecutive content failures seen at one cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Stall {
    cursor: Option<i64>,
    failures: u32,
}

impl<C: Connector> Ingestor<C> {
    pub fn new(connector: C, config: &IngestConfig) -> Self {
        Self {
            connector,
            codec: FrameCodec::new(config.limits),
            interpreter: CommitInterpreter::new(config.car),
            tracker: SequenceTracker::new(config.cursor),
            backoff: Backoff::new(config.backoff.clone()),
            queue_capacity: config.queue_capacity,
            max_stalled_reconnects: config.max_stalled_reconnects,
            stats: IngestStats::default(),
        }
    }

    pub fn cursor(&self) -> Option<i64> {
        self.tracker.cursor()
    }

    /// Ingest until `shutdown` turns true (or its sender is dropped), or
    /// until storage fails.
    ///
    /// Queued batches are written before this returns.
    pub async fn run(
        mut self,
        writer: IndexWriter,
        mut shutdown: watch::Receiver<bool>,
    ) -> IngestResult<IngestReport> {
        let (tx, worker) = IndexWorker::spawn(writer, self.queue_capacity);
        let outcome = self.run_connections(&tx, &mut shutdown).await;
        drop(tx);
        let written = worker.join().await;

        match outcome {
            Ok(()) => {
                let written = written?;
                info!(
                    cursor = ?self.tracker.cursor(),
                    commits = self.stats.commits,
                    inserted = written.inserted,
                    "ingestion stopped"
                );
                Ok(IngestReport {
                    stats: self.stats,
                    written,
                    cursor: self.tracker.cursor(),
                })
            }
            // the worker's own error says why it stopped
            Err(IngestError::WorkerStopped) => Err(written.err().unwrap_or(IngestError::WorkerStopped)),
            Err(err) => Err(err),
        }
    }

    async fn run_connections(
        &mut self,
        tx: &mpsc::Sender<IndexBatch>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> IngestResult<()> {
        let mut stall: Option<Stall> = None;
        loop {
            let cursor = self.tracker.cursor();
            let connected = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => return Ok(()),
                connected = self.connector.connect(cursor) => connected,
            };
            self.stats.connections += 1;

            let result = match connected {
                Ok(mut source) => self.pump(source.as_mut(), tx, shutdown).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(ConnectionEnd::Shutdown) => return Ok(()),
                Ok(ConnectionEnd::Closed) => {
                    info!(cursor = ?self.tracker.cursor(), "firehose closed the stream");
                }
                Err(err) if err.disposition() == Disposition::Fatal => return Err(err),
                Err(err) if err.is_content_failure() => {
                    warn!(error = %err, "firehose connection failed");
                    let cursor = self.tracker.cursor();
                    let failures = match stall {
                        Some(prev) if prev.cursor == cursor => prev.failures + 1,
                        _ => 1,
                    };
                    stall = Some(Stall { cursor, failures });
                    if self.max_stalled_reconnects > 0 && failures >= self.max_stalled_reconnects {
                        error!(?cursor, failures, "firehose keeps failing at the same cursor");
                        return Err(IngestError::Stalled {
                            cursor,
                            attempts: failures,
                            last: Box::new(err),
                        });
                    }
                }
                Err(err) => warn!(error = %err, "firehose connection failed"),
            }

            let delay = self.backoff.next_delay();
            info!(
                delay_ms = delay.as_millis() as u64,
                attempt = self.backoff.attempts(),
                cursor = ?self.tracker.cursor(),
                "reconnecting"
            );
            tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Process frames from one connection until it ends.
    async fn pump(
        &mut self,
        source: &mut dyn FrameSource,
        tx: &mpsc::Sender<IndexBatch>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> IngestResult<ConnectionEnd> {
        loop {
            // shutdown is only observed here, between frames
            let next = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => return Ok(ConnectionEnd::Shutdown),
                next = source.next_frame() => next?,
            };
            let Some(data) = next else {
                return Ok(ConnectionEnd::Closed);
            };
            self.stats.frames += 1;

            let frame = self.codec.decode(&data)?;
            self.backoff.reset();
            match frame {
                Frame::Commit(event) => self.handle_commit(event, tx).await?,
                Frame::Info(info) => {
                    info!(name = %info.name, message = ?info.message, "firehose info");
                }
                Frame::Error(frame) => {
                    self.stats.upstream_errors += 1;
                    error!(error = %frame.error, message = ?frame.message, "firehose error frame");
                    return Err(IngestError::Upstream(frame));
                }
                Frame::Skipped(kind) => trace!(%kind, "skipping frame"),
            }
        }
    }

    async fn handle_commit(
        &mut self,
        event: CommitEvent,
        tx: &mpsc::Sender<IndexBatch>,
    ) -> IngestResult<()> {
        if !self.tracker.accept(event.seq) {
            self.stats.replays += 1;
            return Ok(());
        }
        self.stats.commits += 1;

        let indexed_at = now_timestamp();
        let interpretation = match self.interpreter.interpret(&event, &indexed_at) {
            Ok(interpretation) => interpretation,
            Err(skip) => {
                warn!(seq = event.seq, repo = %event.repo, error = %skip, "skipping commit");
                self.stats.skipped_commits += 1;
                return Ok(());
            }
        };
        self.stats.ops += interpretation.stats;
        if interpretation.rows.is_empty() {
            return Ok(());
        }

        debug!(seq = event.seq, repo = %event.repo, posts = interpretation.rows.len(), "queueing commit");
        // awaits while the queue is full, which stops reading the socket
        tx.send(IndexBatch {
            seq: event.seq,
            rows: interpretation.rows,
        })
        .await
        .map_err(|_| IngestError::WorkerStopped)
    }
}

/// Resolves once shutdown is requested. A dropped sender counts as a request.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffConfig;
    use async_trait::async_trait;
    use bytes::Bytes;
    use skyline_index::{InMemoryPostIndex, PostIndex, RetryPolicy, SqlitePostIndex};
    use skyline_lexicon::Post;
    use skyline_protocol::{ErrorFrame, FrameHeader, InfoEvent, MessageType, RepoOp};
    use skyline_repo::testing::RepoBuilder;
    use skyline_types::{Did, RecordPath};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Serves one scripted connection per `connect`, then requests shutdown.
    struct ScriptedConnector {
        connections: Mutex<VecDeque<Vec<Bytes>>>,
        cursors: Arc<Mutex<Vec<Option<i64>>>>,
        shutdown: watch::Sender<bool>,
    }

    impl ScriptedConnector {
        fn new(connections: Vec<Vec<Bytes>>) -> (Self, watch::Receiver<bool>) {
            let (shutdown, rx) = watch::channel(false);
            let connector = Self {
                connections: Mutex::new(connections.into()),
                cursors: Arc::default(),
                shutdown,
            };
            (connector, rx)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, cursor: Option<i64>) -> IngestResult<Box<dyn FrameSource>> {
            self.cursors.lock().unwrap().push(cursor);
            match self.connections.lock().unwrap().pop_front() {
                Some(frames) => Ok(Box::new(ScriptedSource(frames.into()))),
                None => {
                    self.shutdown.send_replace(true);
                    Err(IngestError::Connect {
                        url: "scripted".into(),
                        reason: "script exhausted".into(),
                    })
                }
            }
        }
    }

    struct ScriptedSource(VecDeque<Bytes>);

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn next_frame(&mut self) -> IngestResult<Option<Bytes>> {
            Ok(self.0.pop_front())
        }
    }

    fn config() -> IngestConfig {
        IngestConfig {
            backoff: BackoffConfig {
                initial_ms: 1,
                max_ms: 5,
                factor: 2.0,
            },
            queue_capacity: 2,
            ..IngestConfig::default()
        }
    }

    fn writer(index: Arc<dyn PostIndex>) -> IndexWriter {
        IndexWriter::new(index, RetryPolicy::default())
    }

    /// A `#commit` frame creating one post per `(rkey, text)`.
    fn commit_frame(seq: i64, posts: &[(&str, &str)]) -> Bytes {
        let mut builder = RepoBuilder::new(Did::new("did:plc:xyz").unwrap());
        let mut ops = Vec::new();
        for (rkey, text) in posts {
            let path = RecordPath::new("app.bsky.feed.post", *rkey).unwrap();
            let post = Post::new(*text, "2024-01-01T00:00:00Z");
            let cid = builder.record(&path, post.encode().unwrap());
            ops.push(RepoOp::create(path.to_key(), cid));
        }
        let built = builder.build().unwrap();
        let event = CommitEvent {
            seq,
            rebase: false,
            too_big: false,
            repo: "did:plc:xyz".into(),
            commit: built.commit,
            rev: "3kbuilder0000".into(),
            since: None,
            blocks: Bytes::from(built.car_bytes().unwrap()),
            ops,
            blobs: Vec::new(),
            time: "2024-01-01T00:00:00.000Z".into(),
            prev_data: None,
        };
        Bytes::from(FrameCodec::encode_commit(&event).unwrap())
    }

    fn texts(index: &dyn PostIndex) -> Vec<String> {
        let mut texts: Vec<String> = index
            .latest(100, None)
            .unwrap()
            .into_iter()
            .map(|row| row.text)
            .collect();
        texts.sort();
        texts
    }

    #[tokio::test]
    async fn hello_world_end_to_end() {
        let (connector, shutdown) =
            ScriptedConnector::new(vec![vec![commit_frame(1, &[("abc123", "hello world")])]]);
        let index = Arc::new(InMemoryPostIndex::new());
        let report = Ingestor::new(connector, &config())
            .run(writer(index.clone()), shutdown)
            .await
            .unwrap();

        assert_eq!(report.written.inserted, 1);
        assert_eq!(report.cursor, Some(1));
        let row = index
            .get("at://did:plc:xyz/app.bsky.feed.post/abc123")
            .unwrap()
            .unwrap();
        assert_eq!(row.text, "hello world");
        assert_eq!(row.reply_parent, None);
        assert_eq!(row.reply_root, None);
    }

    #[tokio::test]
    async fn n_creates_make_n_rows_and_redelivery_adds_none() {
        let frame = commit_frame(7, &[("a1", "one"), ("b2", "two"), ("c3", "three")]);
        let index = Arc::new(InMemoryPostIndex::new());

        let (connector, shutdown) = ScriptedConnector::new(vec![vec![frame.clone()]]);
        let first = Ingestor::new(connector, &config())
            .run(writer(index.clone()), shutdown)
            .await
            .unwrap();
        assert_eq!(first.written.inserted, 3);

        // a fresh run has no cursor, so the commit is processed again
        let (connector, shutdown) = ScriptedConnector::new(vec![vec![frame]]);
        let second = Ingestor::new(connector, &config())
            .run(writer(index.clone()), shutdown)
            .await
            .unwrap();
        assert_eq!(second.written.inserted, 0);
        assert_eq!(second.written.already_indexed, 3);
        assert_eq!(index.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn replayed_seq_is_skipped_within_a_run() {
        let (connector, shutdown) = ScriptedConnector::new(vec![
            vec![commit_frame(5, &[("a", "first")])],
            vec![commit_frame(5, &[("b", "replay")]), commit_frame(6, &[("c", "next")])],
        ]);
        let index = Arc::new(InMemoryPostIndex::new());
        let report = Ingestor::new(connector, &config())
            .run(writer(index.clone()), shutdown)
            .await
            .unwrap();
        assert_eq!(report.stats.replays, 1);
        assert_eq!(texts(index.as_ref()), ["first", "next"]);
    }

    #[tokio::test]
    async fn error_frame_ends_connection() {
        let error = FrameCodec::encode_error(&ErrorFrame {
            error: "ConsumerTooSlow".into(),
            message: Some("slow down".into()),
        })
        .unwrap();
        let (connector, shutdown) = ScriptedConnector::new(vec![vec![
            commit_frame(1, &[("a", "before")]),
            Bytes::from(error),
            commit_frame(2, &[("b", "after")]),
        ]]);
        let cursors = connector.cursors.clone();
        let index = Arc::new(InMemoryPostIndex::new());
        let report = Ingestor::new(connector, &config())
            .run(writer(index.clone()), shutdown)
            .await
            .unwrap();

        assert_eq!(texts(index.as_ref()), ["before"]);
        assert_eq!(report.stats.upstream_errors, 1);
        assert_eq!(*cursors.lock().unwrap(), [None, Some(1)]);
    }

    #[tokio::test]
    async fn decode_error_reconnects_from_cursor() {
        let (connector, shutdown) = ScriptedConnector::new(vec![
            vec![commit_frame(10, &[("a", "ten")]), Bytes::from_static(&[0xa2, 0x00])],
            vec![commit_frame(11, &[("b", "eleven")])],
        ]);
        let cursors = connector.cursors.clone();
        let index = Arc::new(InMemoryPostIndex::new());
        let report = Ingestor::new(connector, &config())
            .run(writer(index.clone()), shutdown)
            .await
            .unwrap();

        assert_eq!(texts(index.as_ref()), ["eleven", "ten"]);
        assert_eq!(*cursors.lock().unwrap(), [None, Some(10), Some(11)]);
        assert_eq!(report.cursor, Some(11));
    }

    #[tokio::test]
    async fn info_and_other_frames_are_not_indexed() {
        let info = FrameCodec::encode_info(&InfoEvent {
            name: "OutdatedCursor".into(),
            message: None,
        })
        .unwrap();
        let identity = FrameCodec::encode(FrameHeader::Message(MessageType::Identity), &[0xa0]).unwrap();
        let (connector, shutdown) = ScriptedConnector::new(vec![vec![
            Bytes::from(info),
            Bytes::from(identity),
            commit_frame(3, &[("a", "post")]),
        ]]);
        let index = Arc::new(InMemoryPostIndex::new());
        let report = Ingestor::new(connector, &config())
            .run(writer(index.clone()), shutdown)
            .await
            .unwrap();
        assert_eq!(report.stats.frames, 3);
        assert_eq!(report.stats.commits, 1);
        assert_eq!(index.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn storage_failure_is_fatal() {
        let (connector, shutdown) =
            ScriptedConnector::new(vec![vec![commit_frame(1, &[("a", "x")])]]);
        // unmigrated: the posts table does not exist
        let index = Arc::new(SqlitePostIndex::open_in_memory().unwrap());
        let err = Ingestor::new(connector, &config())
            .run(writer(index), shutdown)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Index(_)));
    }

    #[tokio::test]
    async fn shutdown_before_start_connects_nowhere() {
        let (connector, shutdown) =
            ScriptedConnector::new(vec![vec![commit_frame(1, &[("a", "x")])]]);
        connector.shutdown.send_replace(true);
        let cursors = connector.cursors.clone();
        let report = Ingestor::new(connector, &config())
            .run(writer(Arc::new(InMemoryPostIndex::new())), shutdown)
            .await
            .unwrap();
        assert_eq!(report.stats.connections, 0);
        assert!(cursors.lock().unwrap().is_empty());
    }

    fn future_cursor_frame() -> Bytes {
        Bytes::from(
            FrameCodec::encode_error(&ErrorFrame {
                error: "FutureCursor".into(),
                message: Some("Cursor in the future.".into()),
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn repeated_failure_at_one_cursor_gives_up() {
        let (connector, shutdown) = ScriptedConnector::new(vec![vec![future_cursor_frame()]; 3]);
        let cursors = connector.cursors.clone();
        let config = IngestConfig {
            cursor: Some(9_000_000_000),
            max_stalled_reconnects: 3,
            ..config()
        };
        let err = Ingestor::new(connector, &config)
            .run(writer(Arc::new(InMemoryPostIndex::new())), shutdown)
            .await
            .unwrap_err();

        match err {
            IngestError::Stalled { cursor, attempts, last } => {
                assert_eq!(cursor, Some(9_000_000_000));
                assert_eq!(attempts, 3);
                assert!(matches!(*last, IngestError::Upstream(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cursors.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn progress_resets_the_stall_count() {
        let bad = Bytes::from_static(&[0xa2, 0x00]);
        let (connector, shutdown) = ScriptedConnector::new(vec![
            vec![bad.clone()],
            vec![commit_frame(1, &[("a", "one")]), bad],
        ]);
        let config = IngestConfig {
            max_stalled_reconnects: 2,
            ..config()
        };
        let report = Ingestor::new(connector, &config)
            .run(writer(Arc::new(InMemoryPostIndex::new())), shutdown)
            .await
            .unwrap();
        assert_eq!(report.cursor, Some(1));
        assert_eq!(report.written.inserted, 1);
    }

    #[tokio::test]
    async fn configured_cursor_is_first_resume_point() {
        let (connector, shutdown) = ScriptedConnector::new(vec![vec![]]);
        let cursors = connector.cursors.clone();
        let config = IngestConfig {
            cursor: Some(500),
            ..config()
        };
        Ingestor::new(connector, &config)
            .run(writer(Arc::new(InMemoryPostIndex::new())), shutdown)
            .await
            .unwrap();
        assert_eq!(cursors.lock().unwrap()[0], Some(500));
    }
}
