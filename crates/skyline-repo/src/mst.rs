//! Merkle Search Tree nodes and record lookup.
//!
//! A repository maps record keys (`<collection>/<rkey>`) to record CIDs
//! through an MST. Each node is a DAG-CBOR map
//! `{l: link|null, e: [{p, k, v, t}]}`: `l` points at the subtree of keys
//! below the first entry, and each entry's `t` at the subtree between that
//! entry and the next. Entry keys are prefix-compressed against the previous
//! entry of the same node.
//!
//! A key's layer is the number of leading zero bits of its sha2-256 digest
//! divided by two, so every node level fans out by roughly four.

use std::cmp::Ordering;

use bytes::Bytes;
use minicbor::{Decoder, Encoder};
use multihash_codetable::{Code, MultihashDigest};
use skyline_store::BlockStore;
use skyline_types::dag_cbor::{self, EncodeError};
use skyline_types::{CborError, CborResult, Cid};
use tracing::trace;

use crate::error::{RepoError, RepoResult};

/// Deepest walk accepted. A sha2-256 digest has at most 128 layers.
pub const MAX_WALK_DEPTH: usize = 130;

/// One entry of an MST node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MstEntry {
    /// Bytes shared with the previous entry's full key.
    pub prefix_len: usize,
    /// Remainder of the key after the shared prefix.
    pub key_suffix: Bytes,
    /// CID of the record stored under this key.
    pub value: Cid,
    /// Subtree holding keys between this entry and the next.
    pub tree: Option<Cid>,
}

/// A decoded MST node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MstNode {
    pub left: Option<Cid>,
    pub entries: Vec<MstEntry>,
}

impl MstNode {
    pub fn decode(cid: &Cid, bytes: &[u8]) -> RepoResult<Self> {
        decode_node(bytes).map_err(|e| RepoError::Node {
            cid: *cid,
            reason: e.to_string(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut enc = Encoder::new(Vec::new());
        enc.map(2)?;
        enc.str("e")?.array(self.entries.len() as u64)?;
        for entry in &self.entries {
            enc.map(4)?;
            enc.str("k")?.bytes(&entry.key_suffix)?;
            enc.str("p")?.u64(entry.prefix_len as u64)?;
            enc.str("t")?;
            dag_cbor::encode_optional_link(&mut enc, entry.tree.as_ref())?;
            enc.str("v")?;
            dag_cbor::encode_link(&mut enc, &entry.value)?;
        }
        enc.str("l")?;
        dag_cbor::encode_optional_link(&mut enc, self.left.as_ref())?;
        Ok(enc.into_writer())
    }

    /// Rebuild the full keys of this node's entries.
    ///
    /// Fails if a prefix length overruns the previous key or the keys are not
    /// strictly ascending.
    pub fn keys(&self, cid: &Cid) -> RepoResult<Vec<Vec<u8>>> {
        let mut keys: Vec<Vec<u8>> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let prev = keys.last().map(Vec::as_slice).unwrap_or_default();
            if entry.prefix_len > prev.len() {
                return Err(RepoError::Node {
                    cid: *cid,
                    reason: format!(
                        "prefix length {} exceeds previous key length {}",
                        entry.prefix_len,
                        prev.len()
                    ),
                });
            }
            let mut key = prev[..entry.prefix_len].to_vec();
            key.extend_from_slice(&entry.key_suffix);
            if !keys.is_empty() && key.as_slice() <= prev {
                return Err(RepoError::Node {
                    cid: *cid,
                    reason: "entry keys are not strictly ascending".into(),
                });
            }
            keys.push(key);
        }
        Ok(keys)
    }
}

fn decode_node(bytes: &[u8]) -> CborResult<MstNode> {
    let mut dec = Decoder::new(bytes);
    let mut node = MstNode::default();
    let mut saw_entries = false;
    for _ in 0..dag_cbor::map_len(&mut dec)? {
        match dag_cbor::text(&mut dec)? {
            "l" => node.left = dag_cbor::optional_link(&mut dec)?,
            "e" => {
                saw_entries = true;
                let len = dag_cbor::array_len(&mut dec)?;
                node.entries.reserve(len.min(64) as usize);
                for _ in 0..len {
                    node.entries.push(decode_entry(&mut dec)?);
                }
            }
            _ => dag_cbor::skip(&mut dec)?,
        }
    }
    dag_cbor::finish(&dec)?;
    if !saw_entries {
        return Err(CborError::MissingField("e"));
    }
    Ok(node)
}

fn decode_entry(dec: &mut Decoder<'_>) -> CborResult<MstEntry> {
    let mut prefix_len = None;
    let mut key_suffix = None;
    let mut value = None;
    let mut tree = None;
    for _ in 0..dag_cbor::map_len(dec)? {
        match dag_cbor::text(dec)? {
            "p" => {
                let p = dag_cbor::int(dec, "p")?;
                prefix_len = Some(usize::try_from(p).map_err(|_| CborError::InvalidField {
                    field: "p",
                    reason: format!("negative prefix length {p}"),
                })?);
            }
            "k" => key_suffix = Some(Bytes::copy_from_slice(dag_cbor::bytes(dec)?)),
            "v" => value = Some(dag_cbor::link(dec)?),
            "t" => tree = dag_cbor::optional_link(dec)?,
            _ => dag_cbor::skip(dec)?,
        }
    }
    Ok(MstEntry {
        prefix_len: prefix_len.ok_or(CborError::MissingField("p"))?,
        key_suffix: key_suffix.ok_or(CborError::MissingField("k"))?,
        value: value.ok_or(CborError::MissingField("v"))?,
        tree,
    })
}

/// Layer of a key: leading zero bits of its sha2-256 digest, halved.
pub fn key_layer(key: &[u8]) -> u32 {
    let digest = Code::Sha2_256.digest(key);
    let mut zeros = 0;
    for byte in digest.digest() {
        if *byte == 0 {
            zeros += 8;
            continue;
        }
        zeros += byte.leading_zeros();
        break;
    }
    zeros / 2
}

/// Find the record CID stored under `key` in the tree rooted at `root`.
///
/// Returns `Ok(None)` when the tree provably holds no such key. A node block
/// missing from the store is [`RepoError::IncompleteSnapshot`]: the walk never
/// guesses past a gap.
pub fn lookup(store: &dyn BlockStore, root: &Cid, key: &[u8]) -> RepoResult<Option<Cid>> {
    let mut current = *root;
    for depth in 0..MAX_WALK_DEPTH {
        let bytes = store
            .get(&current)?
            .ok_or(RepoError::IncompleteSnapshot { cid: current })?;
        let node = MstNode::decode(&current, &bytes)?;
        let keys = node.keys(&current)?;
        trace!(node = %current, depth, entries = keys.len(), "MST node");

        let mut next = node.left;
        let mut found = None;
        for (entry, entry_key) in node.entries.iter().zip(&keys) {
            match key.cmp(entry_key.as_slice()) {
                Ordering::Equal => {
                    found = Some(entry.value);
                    break;
                }
                Ordering::Less => break,
                Ordering::Greater => next = entry.tree,
            }
        }
        if found.is_some() {
            return Ok(found);
        }
        match next {
            Some(child) => current = child,
            None => return Ok(None),
        }
    }
    Err(RepoError::TooDeep(MAX_WALK_DEPTH))
}
