//! Payloads that follow a frame header.

use std::fmt;

use bytes::Bytes;
use minicbor::{Decoder, Encoder};
use skyline_types::dag_cbor::{self, EncodeError};
use skyline_types::{CborError, Cid};

use crate::error::{FrameError, FrameResult};

/// A `#commit` event: one repository commit with the blocks it touched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitEvent {
    pub seq: i64,
    pub rebase: bool,
    /// Set when the commit was too large to ship; `blocks` is then unusable.
    pub too_big: bool,
    /// DID of the repository, unvalidated.
    pub repo: String,
    pub commit: Cid,
    pub rev: String,
    pub since: Option<String>,
    /// CAR v1 file rooted at `commit`.
    pub blocks: Bytes,
    pub ops: Vec<RepoOp>,
    pub blobs: Vec<Cid>,
    pub time: String,
    pub prev_data: Option<Cid>,
}

/// One record mutation inside a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoOp {
    pub action: OpAction,
    /// `<collection>/<rkey>`, unvalidated.
    pub path: String,
    /// CID of the new record; `None` for deletes.
    pub cid: Option<Cid>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpAction {
    Create,
    Update,
    Delete,
}

impl OpAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OpAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An `#info` notice, e.g. `OutdatedCursor`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InfoEvent {
    pub name: String,
    pub message: Option<String>,
}

/// Payload of an error frame (`op = -1`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorFrame {
    /// Error code, e.g. `FutureCursor` or `ConsumerTooSlow`.
    pub error: String,
    pub message: Option<String>,
}

impl fmt::Display for ErrorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.error, message),
            None => f.write_str(&self.error),
        }
    }
}

impl CommitEvent {
    pub(crate) fn decode(
        dec: &mut Decoder<'_>,
        max_ops: usize,
        max_depth: usize,
    ) -> FrameResult<Self> {
        let mut seq = None;
        let mut repo = None;
        let mut commit = None;
        let mut blocks = None;
        let mut ops = None;
        let mut event = PartialCommit::default();

        for _ in 0..dag_cbor::map_len(dec)? {
            match dag_cbor::text(dec)? {
                "seq" => seq = Some(dag_cbor::int(dec, "seq")?),
                "repo" => repo = Some(dag_cbor::text(dec)?.to_string()),
                "commit" => commit = Some(dag_cbor::link(dec)?),
                "blocks" => blocks = Some(Bytes::copy_from_slice(dag_cbor::bytes(dec)?)),
                "ops" => {
                    let count = dag_cbor::array_len(dec)?;
                    if count > max_ops as u64 {
                        return Err(FrameError::TooManyOps {
                            count,
                            max: max_ops,
                        });
                    }
                    let mut list = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        list.push(RepoOp::decode(dec, max_depth)?);
                    }
                    ops = Some(list);
                }
                "rebase" => event.rebase = dec.bool().map_err(CborError::from)?,
                "tooBig" => event.too_big = dec.bool().map_err(CborError::from)?,
                "rev" => event.rev = dag_cbor::text(dec)?.to_string(),
                "since" => event.since = dag_cbor::optional_text(dec)?.map(str::to_string),
                "time" => event.time = dag_cbor::text(dec)?.to_string(),
                "prevData" => event.prev_data = dag_cbor::optional_link(dec)?,
                "blobs" => {
                    for _ in 0..dag_cbor::array_len(dec)? {
                        event.blobs.push(dag_cbor::link(dec)?);
                    }
                }
                _ => dag_cbor::skip_nested(dec, 0, max_depth)?,
            }
        }

        Ok(Self {
            seq: seq.ok_or(CborError::MissingField("seq"))?,
            rebase: event.rebase,
            too_big: event.too_big,
            repo: repo.ok_or(CborError::MissingField("repo"))?,
            commit: commit.ok_or(CborError::MissingField("commit"))?,
            rev: event.rev,
            since: event.since,
            blocks: blocks.ok_or(CborError::MissingField("blocks"))?,
            ops: ops.ok_or(CborError::MissingField("ops"))?,
            blobs: event.blobs,
            time: event.time,
            prev_data: event.prev_data,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut enc = Encoder::new(Vec::new());
        enc.map(11 + u64::from(self.prev_data.is_some()))?;
        enc.str("ops")?.array(self.ops.len() as u64)?;
        for op in &self.ops {
            op.encode(&mut enc)?;
        }
        enc.str("rev")?.str(&self.rev)?;
        enc.str("seq")?.i64(self.seq)?;
        enc.str("repo")?.str(&self.repo)?;
        enc.str("time")?.str(&self.time)?;
        enc.str("blobs")?.array(self.blobs.len() as u64)?;
        for blob in &self.blobs {
            dag_cbor::encode_link(&mut enc, blob)?;
        }
        enc.str("since")?;
        match &self.since {
            Some(since) => enc.str(since)?,
            None => enc.null()?,
        };
        enc.str("blocks")?.bytes(&self.blocks)?;
        enc.str("commit")?;
        dag_cbor::encode_link(&mut enc, &self.commit)?;
        enc.str("rebase")?.bool(self.rebase)?;
        enc.str("tooBig")?.bool(self.too_big)?;
        if let Some(prev_data) = &self.prev_data {
            enc.str("prevData")?;
            dag_cbor::encode_link(&mut enc, prev_data)?;
        }
        Ok(enc.into_writer())
    }
}

#[derive(Default)]
struct PartialCommit {
    rebase: bool,
    too_big: bool,
    rev: String,
    since: Option<String>,
    time: String,
    prev_data: Option<Cid>,
    blobs: Vec<Cid>,
}

impl RepoOp {
    pub fn create(path: impl Into<String>, cid: Cid) -> Self {
        Self {
            action: OpAction::Create,
            path: path.into(),
            cid: Some(cid),
        }
    }

    fn decode(dec: &mut Decoder<'_>, max_depth: usize) -> FrameResult<Self> {
        let mut action = None;
        let mut path = None;
        let mut cid = None;
        for _ in 0..dag_cbor::map_len(dec)? {
            match dag_cbor::text(dec)? {
                "action" => {
                    let raw = dag_cbor::text(dec)?;
                    action = Some(
                        OpAction::parse(raw)
                            .ok_or_else(|| FrameError::UnknownAction(raw.to_string()))?,
                    );
                }
                "path" => path = Some(dag_cbor::text(dec)?.to_string()),
                "cid" => cid = dag_cbor::optional_link(dec)?,
                _ => dag_cbor::skip_nested(dec, 1, max_depth)?,
            }
        }
        Ok(Self {
            action: action.ok_or(CborError::MissingField("action"))?,
            path: path.ok_or(CborError::MissingField("path"))?,
            cid,
        })
    }

    fn encode(&self, enc: &mut Encoder<Vec<u8>>) -> Result<(), EncodeError> {
        enc.map(3)?;
        enc.str("cid")?;
        dag_cbor::encode_optional_link(enc, self.cid.as_ref())?;
        enc.str("path")?.str(&self.path)?;
        enc.str("action")?.str(self.action.as_str())?;
        Ok(())
    }
}

impl InfoEvent {
    pub(crate) fn decode(dec: &mut Decoder<'_>, max_depth: usize) -> FrameResult<Self> {
        let mut name = None;
        let mut message = None;
        for _ in 0..dag_cbor::map_len(dec)? {
            match dag_cbor::text(dec)? {
                "name" => name = Some(dag_cbor::text(dec)?.to_string()),
                "message" => message = dag_cbor::optional_text(dec)?.map(str::to_string),
                _ => dag_cbor::skip_nested(dec, 0, max_depth)?,
            }
        }
        Ok(Self {
            name: name.ok_or(CborError::MissingField("name"))?,
            message,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        encode_pair("name", &self.name, self.message.as_deref())
    }
}

impl ErrorFrame {
    pub(crate) fn decode(dec: &mut Decoder<'_>, max_depth: usize) -> FrameResult<Self> {
        let mut error = None;
        let mut message = None;
        for _ in 0..dag_cbor::map_len(dec)? {
            match dag_cbor::text(dec)? {
                "error" => error = Some(dag_cbor::text(dec)?.to_string()),
                "message" => message = dag_cbor::optional_text(dec)?.map(str::to_string),
                _ => dag_cbor::skip_nested(dec, 0, max_depth)?,
            }
        }
        Ok(Self {
            error: error.ok_or(CborError::MissingField("error"))?,
            message,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        encode_pair("error", &self.error, self.message.as_deref())
    }
}

/// `{<key>: text, message?: text}`; both keys sort before `message`.
fn encode_pair(key: &str, value: &str, message: Option<&str>) -> Result<Vec<u8>, EncodeError> {
    let mut enc = Encoder::new(Vec::new());
    enc.map(1 + u64::from(message.is_some()))?;
    enc.str(key)?.str(value)?;
    if let Some(message) = message {
        enc.str("message")?.str(message)?;
    }
    Ok(enc.into_writer())
}
