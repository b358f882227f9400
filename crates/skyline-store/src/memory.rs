use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use skyline_types::Cid;

use crate::block::Block;
use crate::error::StoreResult;
use crate::traits::BlockStore;

/// In-memory, HashMap-based block store.
///
/// Holds the block set of one commit while its operations are resolved, and
/// doubles as the store for tests. Blocks are reference-counted `Bytes`, so
/// reads do not copy.
pub struct InMemoryBlockStore {
    blocks: RwLock<HashMap<Cid, Bytes>>,
}

impl InMemoryBlockStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blocks.
    pub fn total_bytes(&self) -> u64 {
        self.blocks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    /// Remove a block. Used by tests to simulate an incomplete block set.
    pub fn remove(&self, cid: &Cid) -> bool {
        self.blocks.write().expect("lock poisoned").remove(cid).is_some()
    }

    /// All CIDs in the store, sorted by their byte form.
    pub fn all_cids(&self) -> Vec<Cid> {
        let map = self.blocks.read().expect("lock poisoned");
        let mut cids: Vec<Cid> = map.keys().copied().collect();
        cids.sort_by_key(|cid| cid.to_bytes());
        cids
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn get(&self, cid: &Cid) -> StoreResult<Option<Bytes>> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.get(cid).cloned())
    }

    fn put(&self, block: Block) -> StoreResult<Cid> {
        let (cid, data) = block.into_parts();
        let mut map = self.blocks.write().expect("lock poisoned");
        map.entry(cid).or_insert(data);
        Ok(cid)
    }

    fn contains(&self, cid: &Cid) -> StoreResult<bool> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.contains_key(cid))
    }
}

impl std::fmt::Debug for InMemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlockStore")
            .field("block_count", &self.len())
            .field("total_bytes", &self.total_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn block(content: &[u8]) -> Block {
        Block::dag_cbor(content.to_vec())
    }

    #[test]
    fn put_and_get() {
        let store = InMemoryBlockStore::new();
        let b = block(b"hello world");
        let cid = store.put(b.clone()).unwrap();
        assert_eq!(cid, *b.cid());
        assert_eq!(store.get(&cid).unwrap().unwrap(), b.data().clone());
    }

    #[test]
    fn get_missing_returns_none() {
        let store = InMemoryBlockStore::new();
        let absent = block(b"never stored");
        assert!(store.get(absent.cid()).unwrap().is_none());
        assert!(!store.contains(absent.cid()).unwrap());
    }

    #[test]
    fn put_is_idempotent() {
        let store = InMemoryBlockStore::new();
        store.put(block(b"same")).unwrap();
        store.put(block(b"same")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 4);
    }

    #[test]
    fn put_many_and_get_many() {
        let store = InMemoryBlockStore::new();
        let cids = store
            .put_many(vec![block(b"a"), block(b"b"), block(b"c")])
            .unwrap();
        let missing = *block(b"d").cid();
        let mut query = cids.clone();
        query.push(missing);
        let got = store.get_many(&query).unwrap();
        assert_eq!(got.len(), 4);
        assert!(got[..3].iter().all(Option::is_some));
        assert!(got[3].is_none());
    }

    #[test]
    fn remove_and_all_cids() {
        let store = InMemoryBlockStore::new();
        let a = store.put(block(b"a")).unwrap();
        store.put(block(b"b")).unwrap();
        assert_eq!(store.all_cids().len(), 2);
        assert!(store.remove(&a));
        assert!(!store.remove(&a));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_reads_are_safe() {
        let store = Arc::new(InMemoryBlockStore::new());
        let cid = store.put(block(b"shared")).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.get(&cid).unwrap().is_some())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryBlockStore::default();
        assert!(format!("{store:?}").contains("block_count: 0"));
    }
}
