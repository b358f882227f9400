use std::fmt;

use minicbor::{Decoder, Encoder};
use skyline_types::dag_cbor::{self, EncodeError};
use skyline_types::CborError;

use crate::error::{FrameError, FrameResult};

/// `op` value of a message frame.
pub const OP_MESSAGE: i64 = 1;
/// `op` value of an error frame.
pub const OP_ERROR: i64 = -1;

/// Message types emitted by `com.atproto.sync.subscribeRepos`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    Commit,
    Sync,
    Identity,
    Account,
    Handle,
    Migrate,
    Tombstone,
    Info,
}

impl MessageType {
    pub const ALL: [MessageType; 8] = [
        Self::Commit,
        Self::Sync,
        Self::Identity,
        Self::Account,
        Self::Handle,
        Self::Migrate,
        Self::Tombstone,
        Self::Info,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "#commit" => Self::Commit,
            "#sync" => Self::Sync,
            "#identity" => Self::Identity,
            "#account" => Self::Account,
            "#handle" => Self::Handle,
            "#migrate" => Self::Migrate,
            "#tombstone" => Self::Tombstone,
            "#info" => Self::Info,
            _ => return None,
        })
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Commit => "#commit",
            Self::Sync => "#sync",
            Self::Identity => "#identity",
            Self::Account => "#account",
            Self::Handle => "#handle",
            Self::Migrate => "#migrate",
            Self::Tombstone => "#tombstone",
            Self::Info => "#info",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The first of the two DAG-CBOR values in a frame: `{op, t?}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameHeader {
    Message(MessageType),
    Error,
}

impl FrameHeader {
    /// Decode the header at the start of `data`.
    ///
    /// Returns the header and the offset where the payload begins.
    pub fn decode(data: &[u8]) -> FrameResult<(Self, usize)> {
        let mut dec = Decoder::new(data);
        let mut op = None;
        let mut tag = None;
        for _ in 0..dag_cbor::map_len(&mut dec)? {
            match dag_cbor::text(&mut dec)? {
                "op" => op = Some(dag_cbor::int(&mut dec, "op")?),
                "t" => tag = dag_cbor::optional_text(&mut dec)?,
                _ => dag_cbor::skip(&mut dec)?,
            }
        }
        let offset = dec.position();

        let header = match op.ok_or(CborError::MissingField("op"))? {
            OP_MESSAGE => {
                let tag = tag.ok_or(FrameError::MissingType)?;
                let kind = MessageType::from_tag(tag)
                    .ok_or_else(|| FrameError::UnknownMessageType(tag.to_string()))?;
                Self::Message(kind)
            }
            OP_ERROR => Self::Error,
            other => return Err(FrameError::UnknownOp(other)),
        };
        Ok((header, offset))
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut enc = Encoder::new(Vec::new());
        match self {
            Self::Message(kind) => {
                enc.map(2)?.str("t")?.str(kind.tag())?.str("op")?.i64(OP_MESSAGE)?;
            }
            Self::Error => {
                enc.map(1)?.str("op")?.i64(OP_ERROR)?;
            }
        }
        Ok(enc.into_writer())
    }

    pub fn op(&self) -> i64 {
        match self {
            Self::Message(_) => OP_MESSAGE,
            Self::Error => OP_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameErrorKind;
    use proptest::prelude::*;

    fn header_bytes(op: i64, t: Option<&str>) -> Vec<u8> {
        let mut enc = Encoder::new(Vec::new());
        enc.map(1 + u64::from(t.is_some())).unwrap();
        if let Some(t) = t {
            enc.str("t").unwrap().str(t).unwrap();
        }
        enc.str("op").unwrap().i64(op).unwrap();
        enc.into_writer()
    }

    #[test]
    fn decodes_commit_header_and_payload_offset() {
        let mut data = header_bytes(1, Some("#commit"));
        let len = data.len();
        data.extend_from_slice(&[0xa0]);
        let (header, offset) = FrameHeader::decode(&data).unwrap();
        assert_eq!(header, FrameHeader::Message(MessageType::Commit));
        assert_eq!(offset, len);
    }

    #[test]
    fn error_header_needs_no_type() {
        let (header, _) = FrameHeader::decode(&header_bytes(-1, None)).unwrap();
        assert_eq!(header, FrameHeader::Error);
    }

    #[test]
    fn unknown_type_is_protocol_error() {
        let err = FrameHeader::decode(&header_bytes(1, Some("#labels"))).unwrap_err();
        assert!(matches!(&err, FrameError::UnknownMessageType(t) if t == "#labels"));
        assert_eq!(err.kind(), FrameErrorKind::Protocol);
    }

    #[test]
    fn unknown_op_is_protocol_error() {
        let err = FrameHeader::decode(&header_bytes(2, Some("#commit"))).unwrap_err();
        assert!(matches!(err, FrameError::UnknownOp(2)));
        assert_eq!(err.kind(), FrameErrorKind::Protocol);
    }

    #[test]
    fn garbage_is_decode_error() {
        for data in [&[][..], &[0xff, 0x00][..], &[0x9f, 0x01, 0xff][..]] {
            let err = FrameHeader::decode(data).unwrap_err();
            assert_eq!(err.kind(), FrameErrorKind::Decode, "{data:?}: {err}");
        }
        let err = FrameHeader::decode(&header_bytes(1, None)).unwrap_err();
        assert!(matches!(err, FrameError::MissingType));
    }

    #[test]
    fn every_type_tag_parses_back() {
        for kind in MessageType::ALL {
            assert_eq!(MessageType::from_tag(kind.tag()), Some(kind));
        }
    }

    fn any_header() -> impl Strategy<Value = FrameHeader> {
        prop_oneof![
            Just(FrameHeader::Error),
            proptest::sample::select(MessageType::ALL.to_vec()).prop_map(FrameHeader::Message),
        ]
    }

    proptest! {
        #[test]
        fn decode_then_reencode_is_identity(header in any_header(), payload in proptest::collection::vec(any::<u8>(), 0..32)) {
            let mut data = header.encode().unwrap();
            let header_len = data.len();
            data.extend_from_slice(&payload);

            let (decoded, offset) = FrameHeader::decode(&data).unwrap();
            prop_assert_eq!(decoded, header);
            prop_assert_eq!(offset, header_len);
            prop_assert_eq!(decoded.encode().unwrap(), data[..header_len].to_vec());
        }
    }
}
