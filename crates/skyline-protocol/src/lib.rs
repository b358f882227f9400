//! Wire protocol for Skyline.
//!
//! Decodes the frames of `com.atproto.sync.subscribeRepos`: every WebSocket
//! binary message holds a DAG-CBOR header (`{op, t}`) followed by a DAG-CBOR
//! payload. Also defines the XRPC request and response types exchanged with
//! the upstream service and served to feed consumers.

pub mod auth;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod header;
pub mod message;

pub use auth::{AuthState, CreateSessionRequest, SessionTokens};
pub use codec::{DecodeLimits, Frame, FrameCodec};
pub use endpoint::{
    endpoints, nsid, subscribe_url, xrpc_url, FeedDescriptor, FeedGeneratorDescription,
    FeedSkeleton, FeedSkeletonParams, HealthResponse, SkeletonPost, XrpcError,
};
pub use error::{FrameError, FrameErrorKind, FrameResult};
pub use header::{FrameHeader, MessageType, OP_ERROR, OP_MESSAGE};
pub use message::{CommitEvent, ErrorFrame, InfoEvent, OpAction, RepoOp};
