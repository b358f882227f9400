use minicbor::Decoder;
use skyline_types::dag_cbor;
use skyline_types::CborResult;

use crate::error::{LexiconError, LexiconResult};
use crate::post::{Post, POST_NSID};

/// A repository record, classified by its `$type`.
///
/// Only posts are decoded. Every other schema (likes, follows, reposts,
/// profiles, and types this build has never heard of) lands in `Other`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    Post(Post),
    Other { record_type: String },
}

impl Record {
    /// Classify a record block.
    pub fn decode(bytes: &[u8]) -> LexiconResult<Self> {
        let record_type = read_type(bytes)?.ok_or(LexiconError::MissingType)?;
        match record_type {
            POST_NSID => Post::decode(bytes)
                .map(Record::Post)
                .map_err(|source| LexiconError::Malformed {
                    nsid: POST_NSID,
                    source,
                }),
            other => Ok(Record::Other {
                record_type: other.to_string(),
            }),
        }
    }

    /// The record's schema identifier.
    pub fn nsid(&self) -> &str {
        match self {
            Record::Post(_) => POST_NSID,
            Record::Other { record_type } => record_type.as_str(),
        }
    }

    pub fn as_post(&self) -> Option<&Post> {
        match self {
            Record::Post(post) => Some(post),
            Record::Other { .. } => None,
        }
    }

    pub fn into_post(self) -> Option<Post> {
        match self {
            Record::Post(post) => Some(post),
            Record::Other { .. } => None,
        }
    }
}

/// Read the top-level `$type` without decoding anything else.
///
/// Canonical key order puts `$type` after shorter keys such as `text`, so the
/// whole map is scanned.
fn read_type(bytes: &[u8]) -> CborResult<Option<&str>> {
    let mut dec = Decoder::new(bytes);
    let mut found = None;
    for _ in 0..dag_cbor::map_len(&mut dec)? {
        match dag_cbor::text(&mut dec)? {
            "$type" => found = Some(dag_cbor::text(&mut dec)?),
            _ => dag_cbor::skip(&mut dec)?,
        }
    }
    dag_cbor::finish(&dec)?;
    Ok(found)
}
