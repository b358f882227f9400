use bytes::Bytes;
use skyline_types::{dag_cbor_cid, verify_cid, Cid};

use crate::error::{StoreError, StoreResult};

/// A content-addressed block: bytes plus the CID they hash to.
///
/// The store never interprets block contents; decoding a block as a commit,
/// an MST node, or a record is the job of the layers above.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    cid: Cid,
    data: Bytes,
}

impl Block {
    /// Build a block, checking that `data` hashes to `cid`.
    pub fn verified(cid: Cid, data: impl Into<Bytes>) -> StoreResult<Self> {
        let data = data.into();
        if !verify_cid(&cid, &data)? {
            return Err(StoreError::HashMismatch(cid));
        }
        Ok(Self { cid, data })
    }

    /// Build a DAG-CBOR block, computing its CID.
    pub fn dag_cbor(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            cid: dag_cbor_cid(&data),
            data,
        }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_parts(self) -> (Cid, Bytes) {
        (self.cid, self.data)
    }
}
