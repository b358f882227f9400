use skyline_types::CborError;
use thiserror::Error;

/// How a frame failure is classified by the ingestion loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameErrorKind {
    /// The bytes are not a well-formed frame.
    Decode,
    /// The frame is well-formed but speaks a protocol this decoder does not.
    Protocol,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] CborError),

    #[error("frame too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("commit carries {count} ops (max {max})")]
    TooManyOps { count: u64, max: usize },

    #[error("unknown frame op {0}")]
    UnknownOp(i64),

    #[error("message frame without a type")]
    MissingType,

    #[error("unrecognized message type {0:?}")]
    UnknownMessageType(String),

    #[error("unknown op action {0:?}")]
    UnknownAction(String),
}

impl FrameError {
    pub fn kind(&self) -> FrameErrorKind {
        match self {
            Self::UnknownOp(_) | Self::UnknownMessageType(_) => FrameErrorKind::Protocol,
            Self::Malformed(_)
            | Self::TooLarge { .. }
            | Self::TooManyOps { .. }
            | Self::MissingType
            | Self::UnknownAction(_) => FrameErrorKind::Decode,
        }
    }
}

pub type FrameResult<T> = Result<T, FrameError>;
