//! CAR v1 (Content Addressable aRchive) reading and writing.
//!
//! Layout: `varint(len) || header` followed by sections of
//! `varint(len) || cid-bytes || block-bytes`. The header is a DAG-CBOR map
//! `{roots: [link], version: 1}`. Every block is verified against its CID as
//! it is loaded.

use std::io::Cursor;

use minicbor::{Decoder, Encoder};
use serde::{Deserialize, Serialize};
use skyline_types::dag_cbor::{self, EncodeError};
use skyline_types::{CborError, Cid};
use tracing::trace;

use crate::block::Block;
use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryBlockStore;
use crate::traits::BlockStore;

/// Bounds applied while reading a CAR.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarLimits {
    pub max_blocks: usize,
    pub max_block_size: usize,
}

impl Default for CarLimits {
    fn default() -> Self {
        Self {
            max_blocks: 10_000,
            max_block_size: 2 * 1024 * 1024,
        }
    }
}

/// A decoded CAR: declared roots plus the verified block set.
#[derive(Debug)]
pub struct CarFile {
    pub roots: Vec<Cid>,
    pub blocks: InMemoryBlockStore,
}

impl CarFile {
    /// Read a CAR with default limits.
    pub fn read(data: &[u8]) -> StoreResult<Self> {
        Self::read_with_limits(data, CarLimits::default())
    }

    pub fn read_with_limits(data: &[u8], limits: CarLimits) -> StoreResult<Self> {
        let mut pos = 0;
        let header = read_section(data, &mut pos)?;
        let roots = decode_header(header)?;

        let blocks = InMemoryBlockStore::new();
        let mut count = 0usize;
        while pos < data.len() {
            let offset = pos;
            let section = read_section(data, &mut pos)?;
            count += 1;
            if count > limits.max_blocks {
                return Err(StoreError::LimitExceeded(format!(
                    "more than {} blocks",
                    limits.max_blocks
                )));
            }

            let mut cursor = Cursor::new(section);
            let cid = Cid::read_bytes(&mut cursor).map_err(|e| StoreError::InvalidCid {
                offset,
                reason: e.to_string(),
            })?;
            let body = &section[cursor.position() as usize..];
            if body.len() > limits.max_block_size {
                return Err(StoreError::LimitExceeded(format!(
                    "block {cid} is {} bytes (max {})",
                    body.len(),
                    limits.max_block_size
                )));
            }
            blocks.put(Block::verified(cid, body.to_vec())?)?;
        }

        trace!(roots = roots.len(), blocks = blocks.len(), "read CAR");
        Ok(Self { roots, blocks })
    }

    /// The first declared root, which for repository diffs is the commit.
    pub fn root(&self) -> Option<&Cid> {
        self.roots.first()
    }
}

fn decode_header(header: &[u8]) -> StoreResult<Vec<Cid>> {
    let mut dec = Decoder::new(header);
    let mut roots = None;
    let mut version = None;
    for _ in 0..dag_cbor::map_len(&mut dec)? {
        match dag_cbor::text(&mut dec)? {
            "roots" => {
                let len = dag_cbor::array_len(&mut dec)?;
                let mut list = Vec::with_capacity(len.min(16) as usize);
                for _ in 0..len {
                    list.push(dag_cbor::link(&mut dec)?);
                }
                roots = Some(list);
            }
            "version" => version = Some(dag_cbor::int(&mut dec, "version")?),
            _ => dag_cbor::skip(&mut dec)?,
        }
    }
    match version {
        Some(1) => {}
        Some(other) => return Err(StoreError::UnsupportedVersion(other)),
        None => return Err(CborError::MissingField("version").into()),
    }
    roots.ok_or_else(|| CborError::MissingField("roots").into())
}

fn read_section<'a>(data: &'a [u8], pos: &mut usize) -> StoreResult<&'a [u8]> {
    let len = read_varint(data, pos)?;
    let len = usize::try_from(len).map_err(|_| StoreError::Varint(*pos))?;
    let available = data.len() - *pos;
    if len > available {
        return Err(StoreError::Truncated {
            offset: *pos,
            needed: len,
            available,
        });
    }
    let section = &data[*pos..*pos + len];
    *pos += len;
    Ok(section)
}

fn read_varint(data: &[u8], pos: &mut usize) -> StoreResult<u64> {
    let start = *pos;
    let mut value: u64 = 0;
    for shift in (0..64).step_by(7) {
        let Some(&byte) = data.get(*pos) else {
            return Err(StoreError::Truncated {
                offset: *pos,
                needed: 1,
                available: 0,
            });
        };
        *pos += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(StoreError::Varint(start))
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Builds CAR bytes from a root list and blocks.
///
/// Used to produce block sets for commit events in tooling and tests.
#[derive(Debug, Default)]
pub struct CarWriter {
    roots: Vec<Cid>,
    blocks: Vec<Block>,
}

impl CarWriter {
    pub fn new(roots: Vec<Cid>) -> Self {
        Self {
            roots,
            blocks: Vec::new(),
        }
    }

    pub fn add(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut enc = Encoder::new(Vec::new());
        // DAG-CBOR key order: shorter keys first
        enc.map(2)?.str("roots")?.array(self.roots.len() as u64)?;
        for root in &self.roots {
            dag_cbor::encode_link(&mut enc, root)?;
        }
        enc.str("version")?.u64(1)?;
        let header = enc.into_writer();

        let mut out = Vec::new();
        write_varint(&mut out, header.len() as u64);
        out.extend_from_slice(&header);
        for block in &self.blocks {
            let cid = block.cid().to_bytes();
            write_varint(&mut out, (cid.len() + block.len()) as u64);
            out.extend_from_slice(&cid);
            out.extend_from_slice(block.data());
        }
        Ok(out)
    }
}
