use skyline_index::IndexError;
use skyline_lexicon::LexiconError;
use skyline_protocol::{ErrorFrame, FrameError, FrameErrorKind};
use skyline_repo::RepoError;
use skyline_types::{Cid, TypeError};
use thiserror::Error;

/// What the ingestion loop does after an [`IngestError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Drop the connection and reconnect with backoff.
    Reconnect,
    /// Stop ingesting; the process cannot make progress.
    Fatal,
}

/// Errors that end a connection or the whole ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(FrameError),

    #[error("protocol error: {0}")]
    Protocol(FrameError),

    #[error("upstream error frame: {0}")]
    Upstream(ErrorFrame),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("index worker stopped unexpectedly")]
    WorkerStopped,

    /// The upstream keeps failing the same way at the same cursor.
    #[error("no progress after {attempts} attempts at cursor {cursor:?}: {last}")]
    Stalled {
        cursor: Option<i64>,
        attempts: u32,
        last: Box<IngestError>,
    },
}

impl IngestError {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Index(_) | Self::WorkerStopped | Self::Stalled { .. } => Disposition::Fatal,
            Self::Connect { .. }
            | Self::Transport(_)
            | Self::Decode(_)
            | Self::Protocol(_)
            | Self::Upstream(_) => Disposition::Reconnect,
        }
    }
}

impl IngestError {
    /// Failures caused by what the upstream sent rather than by the network.
    /// Repeating them at the same cursor means the same bytes will arrive.
    pub fn is_content_failure(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Protocol(_) | Self::Upstream(_))
    }
}

impl From<FrameError> for IngestError {
    fn from(err: FrameError) -> Self {
        match err.kind() {
            FrameErrorKind::Decode => Self::Decode(err),
            FrameErrorKind::Protocol => Self::Protocol(err),
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Why a whole commit was skipped. The connection stays up.
#[derive(Debug, Error)]
pub enum CommitSkip {
    #[error("commit is too big to carry its blocks")]
    TooBig,

    #[error("invalid repo identifier: {0}")]
    InvalidRepo(TypeError),

    #[error("unreadable block set: {0}")]
    Snapshot(RepoError),

    #[error("block set is for {found}, event names {expected}")]
    RepoMismatch { expected: String, found: String },
}

/// Why a single op was skipped. The rest of the commit is still processed.
#[derive(Debug, Error)]
pub enum OpSkip {
    #[error("invalid record path: {0}")]
    InvalidPath(TypeError),

    #[error("create op without a record CID")]
    MissingCid,

    #[error("record is not in the repository tree")]
    NotInTree,

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("tree holds {found} but op names {expected}")]
    RecordMismatch { expected: Cid, found: Cid },

    #[error("unreadable record: {0}")]
    Record(#[from] LexiconError),
}

impl OpSkip {
    /// Incomplete block sets are routine on the firehose; everything else is
    /// worth a warning.
    pub fn is_routine(&self) -> bool {
        matches!(self, Self::Repo(e) if e.is_incomplete())
    }
}
