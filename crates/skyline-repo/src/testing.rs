//! Builders for repository snapshots.
//!
//! Produces real, layered MSTs and signed commits so that decoders and the
//! ingestion pipeline can be exercised without a relay. Signatures are zero
//! bytes; nothing in the pipeline verifies them.

use std::collections::BTreeMap;

use bytes::Bytes;
use skyline_store::{Block, CarWriter};
use skyline_types::dag_cbor::EncodeError;
use skyline_types::{Cid, Did, RecordPath};

use crate::commit::SignedCommit;
use crate::mst::{key_layer, MstEntry, MstNode};

/// Accumulates records and builds a complete repository block set.
#[derive(Debug)]
pub struct RepoBuilder {
    did: Did,
    rev: String,
    records: BTreeMap<String, Block>,
}

impl RepoBuilder {
    pub fn new(did: Did) -> Self {
        Self {
            did,
            rev: "3kbuilder0000".into(),
            records: BTreeMap::new(),
        }
    }

    pub fn rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = rev.into();
        self
    }

    /// Add (or replace) the record at `path`. Returns the record's CID.
    pub fn record(&mut self, path: &RecordPath, data: impl Into<Bytes>) -> Cid {
        let block = Block::dag_cbor(data);
        let cid = *block.cid();
        self.records.insert(path.to_key(), block);
        cid
    }

    pub fn build(&self) -> Result<BuiltRepo, EncodeError> {
        let leaves: Vec<Leaf<'_>> = self
            .records
            .iter()
            .map(|(key, block)| Leaf {
                key: key.as_bytes(),
                value: *block.cid(),
                layer: key_layer(key.as_bytes()),
            })
            .collect();
        let top = leaves.iter().map(|leaf| leaf.layer).max().unwrap_or(0);

        let mut blocks = Vec::new();
        let (mst_root, depth) = build_node(&leaves, top, &mut blocks)?;

        let commit = SignedCommit {
            did: self.did.clone(),
            version: 3,
            data: mst_root,
            rev: self.rev.clone(),
            prev: None,
            sig: Bytes::from(vec![0u8; 64]),
        };
        let commit = Block::dag_cbor(commit.encode()?);
        let commit_cid = *commit.cid();
        blocks.push(commit);
        blocks.extend(self.records.values().cloned());

        Ok(BuiltRepo {
            commit: commit_cid,
            mst_root,
            depth,
            blocks,
            records: self
                .records
                .iter()
                .map(|(key, block)| (key.clone(), *block.cid()))
                .collect(),
        })
    }
}

/// Output of [`RepoBuilder::build`].
#[derive(Debug)]
pub struct BuiltRepo {
    pub commit: Cid,
    pub mst_root: Cid,
    /// Number of node levels from the root down to layer 0.
    pub depth: usize,
    pub blocks: Vec<Block>,
    records: BTreeMap<String, Cid>,
}

impl BuiltRepo {
    pub fn record_cid(&self, path: &RecordPath) -> Option<Cid> {
        self.records.get(&path.to_key()).copied()
    }

    /// The full block set as a CAR rooted at the commit.
    pub fn car_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        self.car_bytes_without(&[])
    }

    /// The block set minus `omit`, for incomplete-snapshot scenarios.
    pub fn car_bytes_without(&self, omit: &[Cid]) -> Result<Vec<u8>, EncodeError> {
        let mut writer = CarWriter::new(vec![self.commit]);
        for block in &self.blocks {
            if !omit.contains(block.cid()) {
                writer.add(block.clone());
            }
        }
        writer.to_bytes()
    }
}

struct Leaf<'a> {
    key: &'a [u8],
    value: Cid,
    layer: u32,
}

/// Build the node holding every leaf of `layer` in `leaves`, recursing into
/// the gaps between them. Returns the node CID and the depth below it.
fn build_node(
    leaves: &[Leaf<'_>],
    layer: u32,
    blocks: &mut Vec<Block>,
) -> Result<(Cid, usize), EncodeError> {
    let mut node = MstNode::default();
    let mut depth = 1;
    let mut start = 0;
    let mut prev_key: &[u8] = &[];

    for (i, leaf) in leaves.iter().enumerate() {
        if leaf.layer < layer {
            continue;
        }
        let (tree, below) = build_subtree(&leaves[start..i], layer, blocks)?;
        depth = depth.max(below + 1);
        match node.entries.last_mut() {
            Some(last) => last.tree = tree,
            None => node.left = tree,
        }

        let prefix_len = common_prefix(prev_key, leaf.key);
        node.entries.push(MstEntry {
            prefix_len,
            key_suffix: Bytes::copy_from_slice(&leaf.key[prefix_len..]),
            value: leaf.value,
            tree: None,
        });
        prev_key = leaf.key;
        start = i + 1;
    }

    let (tree, below) = build_subtree(&leaves[start..], layer, blocks)?;
    depth = depth.max(below + 1);
    match node.entries.last_mut() {
        Some(last) => last.tree = tree,
        None => node.left = tree,
    }

    let block = Block::dag_cbor(node.encode()?);
    let cid = *block.cid();
    blocks.push(block);
    Ok((cid, depth))
}

fn build_subtree(
    leaves: &[Leaf<'_>],
    layer: u32,
    blocks: &mut Vec<Block>,
) -> Result<(Option<Cid>, usize), EncodeError> {
    if leaves.is_empty() || layer == 0 {
        return Ok((None, 0));
    }
    let (cid, depth) = build_node(leaves, layer - 1, blocks)?;
    Ok((Some(cid), depth))
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
