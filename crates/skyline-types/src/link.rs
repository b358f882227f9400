//! Content identifiers for blocks and records.
//!
//! Repository blocks are addressed by CIDv1 with a sha2-256 multihash. The
//! codec is DAG-CBOR for structured nodes (commits, MST nodes, records) and
//! raw for opaque bytes.

use multihash_codetable::{Code, MultihashDigest};

pub use cid::Cid;

use crate::error::TypeError;

/// Multicodec for DAG-CBOR blocks.
pub const DAG_CBOR: u64 = 0x71;
/// Multicodec for raw byte blocks.
pub const RAW: u64 = 0x55;
/// Multihash code for sha2-256.
pub const SHA2_256: u64 = 0x12;

/// Compute the CIDv1 of `data` under the given codec.
pub fn cid_for(codec: u64, data: &[u8]) -> Cid {
    Cid::new_v1(codec, Code::Sha2_256.digest(data))
}

/// Compute the CIDv1 of a DAG-CBOR block.
pub fn dag_cbor_cid(data: &[u8]) -> Cid {
    cid_for(DAG_CBOR, data)
}

/// Check that `data` hashes to `cid`.
///
/// Returns `Ok(false)` on a digest mismatch and an error when the CID uses a
/// hash function this crate cannot recompute.
pub fn verify_cid(cid: &Cid, data: &[u8]) -> Result<bool, TypeError> {
    let hash = cid.hash();
    if hash.code() != SHA2_256 {
        return Err(TypeError::InvalidCid(format!(
            "unsupported multihash code {:#x} in {cid}",
            hash.code()
        )));
    }
    let computed = Code::Sha2_256.digest(data);
    Ok(computed.digest() == hash.digest())
}

/// Parse a CID from its string form.
pub fn parse_cid(s: &str) -> Result<Cid, TypeError> {
    Cid::try_from(s).map_err(|e| TypeError::InvalidCid(format!("{s}: {e}")))
}
