use minicbor::Decoder;
use serde::{Deserialize, Serialize};
use skyline_types::dag_cbor::{self, EncodeError};
use tracing::trace;

use crate::error::{FrameError, FrameResult};
use crate::header::{FrameHeader, MessageType};
use crate::message::{CommitEvent, ErrorFrame, InfoEvent};

/// Bounds applied to every frame before and while it is decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeLimits {
    pub max_frame_size: usize,
    pub max_ops: usize,
    pub max_depth: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_frame_size: 5 * 1024 * 1024,
            max_ops: 200,
            max_depth: dag_cbor::DEFAULT_MAX_DEPTH,
        }
    }
}

/// A decoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Commit(CommitEvent),
    Info(InfoEvent),
    /// The upstream ended the stream with an error.
    Error(ErrorFrame),
    /// A recognized message type whose payload is not needed.
    Skipped(MessageType),
}

impl Frame {
    /// Upstream sequence number, for frames that carry one.
    pub fn seq(&self) -> Option<i64> {
        match self {
            Self::Commit(commit) => Some(commit.seq),
            _ => None,
        }
    }
}

/// Decoder for `subscribeRepos` frames.
///
/// Each WebSocket binary message is exactly one frame: a header value
/// followed by a payload value. Skipping a payload means ignoring the rest of
/// the message, so the next message always starts at a header.
#[derive(Clone, Debug, Default)]
pub struct FrameCodec {
    limits: DecodeLimits,
}

impl FrameCodec {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &DecodeLimits {
        &self.limits
    }

    /// Decode one complete frame.
    pub fn decode(&self, data: &[u8]) -> FrameResult<Frame> {
        if data.len() > self.limits.max_frame_size {
            return Err(FrameError::TooLarge {
                size: data.len(),
                max: self.limits.max_frame_size,
            });
        }
        let (header, offset) = FrameHeader::decode(data)?;
        trace!(?header, size = data.len(), "frame header");

        let mut dec = Decoder::new(data);
        dec.set_position(offset);
        let max_depth = self.limits.max_depth;
        let frame = match header {
            FrameHeader::Error => Frame::Error(ErrorFrame::decode(&mut dec, max_depth)?),
            FrameHeader::Message(MessageType::Commit) => Frame::Commit(CommitEvent::decode(
                &mut dec,
                self.limits.max_ops,
                max_depth,
            )?),
            FrameHeader::Message(MessageType::Info) => {
                Frame::Info(InfoEvent::decode(&mut dec, max_depth)?)
            }
            FrameHeader::Message(other) => return Ok(Frame::Skipped(other)),
        };
        dag_cbor::finish(&dec)?;
        Ok(frame)
    }

    /// Encode a header and payload into one frame.
    pub fn encode(header: FrameHeader, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let mut out = header.encode()?;
        out.extend_from_slice(payload);
        Ok(out)
    }

    pub fn encode_commit(event: &CommitEvent) -> Result<Vec<u8>, EncodeError> {
        Self::encode(FrameHeader::Message(MessageType::Commit), &event.encode()?)
    }

    pub fn encode_info(event: &InfoEvent) -> Result<Vec<u8>, EncodeError> {
        Self::encode(FrameHeader::Message(MessageType::Info), &event.encode()?)
    }

    pub fn encode_error(frame: &ErrorFrame) -> Result<Vec<u8>, EncodeError> {
        Self::encode(FrameHeader::Error, &frame.encode()?)
    }
}
