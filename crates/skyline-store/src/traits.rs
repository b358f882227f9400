use bytes::Bytes;
use skyline_types::Cid;

use crate::block::Block;
use crate::error::StoreResult;

/// Content-addressed block store.
///
/// All implementations must satisfy these invariants:
/// - Blocks are immutable once written. The same CID always maps to the
///   same bytes.
/// - A block is only accepted if its bytes hash to its CID.
/// - `get` never reaches outside the store: a missing block is `Ok(None)`,
///   not a fetch.
pub trait BlockStore: Send + Sync {
    /// Read a block by CID. Returns `Ok(None)` if the block is absent.
    fn get(&self, cid: &Cid) -> StoreResult<Option<Bytes>>;

    /// Insert a block. Inserting an existing block is a no-op.
    fn put(&self, block: Block) -> StoreResult<Cid>;

    /// Check whether a block is present.
    fn contains(&self, cid: &Cid) -> StoreResult<bool>;

    /// Read several blocks. Backends may override for fewer round-trips.
    fn get_many(&self, cids: &[Cid]) -> StoreResult<Vec<Option<Bytes>>> {
        cids.iter().map(|cid| self.get(cid)).collect()
    }

    /// Insert several blocks.
    fn put_many(&self, blocks: Vec<Block>) -> StoreResult<Vec<Cid>> {
        blocks.into_iter().map(|block| self.put(block)).collect()
    }
}
