use minicbor::{Decoder, Encoder};
use skyline_types::dag_cbor::{self, EncodeError};
use skyline_types::{CborError, CborResult};

/// Schema identifier of post records.
pub const POST_NSID: &str = "app.bsky.feed.post";

/// A post record (`app.bsky.feed.post`).
///
/// Only the fields the index stores are decoded. Facets, embeds, labels and
/// tags are skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Post {
    pub text: String,
    /// Author-asserted creation time, exactly as written in the record.
    pub created_at: Option<String>,
    pub reply: Option<ReplyRef>,
    pub langs: Vec<String>,
}

/// Thread position of a reply.
///
/// Well-formed replies carry both refs; either may be absent in the wild.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplyRef {
    pub root: Option<StrongRef>,
    pub parent: Option<StrongRef>,
}

/// A reference to a specific version of a record: its URI and CID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

impl Post {
    pub fn new(text: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created_at: Some(created_at.into()),
            ..Self::default()
        }
    }

    pub fn with_reply(mut self, root: Option<StrongRef>, parent: Option<StrongRef>) -> Self {
        self.reply = Some(ReplyRef { root, parent });
        self
    }

    pub(crate) fn decode(bytes: &[u8]) -> CborResult<Self> {
        let mut dec = Decoder::new(bytes);
        let mut text = None;
        let mut post = Post::default();
        for _ in 0..dag_cbor::map_len(&mut dec)? {
            match dag_cbor::text(&mut dec)? {
                "text" => text = Some(dag_cbor::text(&mut dec)?.to_string()),
                "createdAt" => {
                    post.created_at = dag_cbor::optional_text(&mut dec)?.map(str::to_string)
                }
                "reply" => post.reply = decode_reply(&mut dec)?,
                "langs" => {
                    for _ in 0..dag_cbor::array_len(&mut dec)? {
                        post.langs.push(dag_cbor::text(&mut dec)?.to_string());
                    }
                }
                _ => dag_cbor::skip(&mut dec)?,
            }
        }
        dag_cbor::finish(&dec)?;
        post.text = text.ok_or(CborError::MissingField("text"))?;
        Ok(post)
    }

    /// Encode as a DAG-CBOR record block, `$type` included.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut enc = Encoder::new(Vec::new());
        let len = 2
            + u64::from(self.created_at.is_some())
            + u64::from(!self.langs.is_empty())
            + u64::from(self.reply.is_some());
        enc.map(len)?;
        enc.str("text")?.str(&self.text)?;
        enc.str("$type")?.str(POST_NSID)?;
        if !self.langs.is_empty() {
            enc.str("langs")?.array(self.langs.len() as u64)?;
            for lang in &self.langs {
                enc.str(lang)?;
            }
        }
        if let Some(reply) = &self.reply {
            enc.str("reply")?;
            encode_reply(&mut enc, reply)?;
        }
        if let Some(created_at) = &self.created_at {
            enc.str("createdAt")?.str(created_at)?;
        }
        Ok(enc.into_writer())
    }
}

fn decode_reply(dec: &mut Decoder<'_>) -> CborResult<Option<ReplyRef>> {
    if dag_cbor::is_null(dec)? {
        dec.null()?;
        return Ok(None);
    }
    let mut reply = ReplyRef::default();
    for _ in 0..dag_cbor::map_len(dec)? {
        match dag_cbor::text(dec)? {
            "root" => reply.root = decode_strong_ref(dec)?,
            "parent" => reply.parent = decode_strong_ref(dec)?,
            _ => dag_cbor::skip(dec)?,
        }
    }
    Ok(Some(reply))
}

fn decode_strong_ref(dec: &mut Decoder<'_>) -> CborResult<Option<StrongRef>> {
    if dag_cbor::is_null(dec)? {
        dec.null()?;
        return Ok(None);
    }
    let mut uri = None;
    let mut cid = None;
    for _ in 0..dag_cbor::map_len(dec)? {
        match dag_cbor::text(dec)? {
            "uri" => uri = Some(dag_cbor::text(dec)?.to_string()),
            "cid" => cid = Some(dag_cbor::text(dec)?.to_string()),
            _ => dag_cbor::skip(dec)?,
        }
    }
    // a ref without a uri points nowhere; treat it as absent
    Ok(uri.map(|uri| StrongRef {
        uri,
        cid: cid.unwrap_or_default(),
    }))
}

fn encode_reply(enc: &mut Encoder<Vec<u8>>, reply: &ReplyRef) -> Result<(), EncodeError> {
    let len = u64::from(reply.root.is_some()) + u64::from(reply.parent.is_some());
    enc.map(len)?;
    if let Some(root) = &reply.root {
        enc.str("root")?;
        encode_strong_ref(enc, root)?;
    }
    if let Some(parent) = &reply.parent {
        enc.str("parent")?;
        encode_strong_ref(enc, parent)?;
    }
    Ok(())
}

fn encode_strong_ref(enc: &mut Encoder<Vec<u8>>, strong: &StrongRef) -> Result<(), EncodeError> {
    enc.map(2)?;
    enc.str("cid")?.str(&strong.cid)?;
    enc.str("uri")?.str(&strong.uri)?;
    Ok(())
}
