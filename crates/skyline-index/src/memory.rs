use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::IndexResult;
use crate::row::{FeedCursor, InsertOutcome, PostRow};
use crate::traits::PostIndex;

/// In-memory post index for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryPostIndex {
    rows: RwLock<HashMap<String, PostRow>>,
}

impl InMemoryPostIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PostIndex for InMemoryPostIndex {
    fn migrate(&self) -> IndexResult<()> {
        Ok(())
    }

    fn insert_if_absent(&self, row: &PostRow) -> IndexResult<InsertOutcome> {
        let mut rows = self.rows.write().expect("lock poisoned");
        if rows.contains_key(&row.uri) {
            return Ok(InsertOutcome::AlreadyIndexed);
        }
        rows.insert(row.uri.clone(), row.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn get(&self, uri: &str) -> IndexResult<Option<PostRow>> {
        Ok(self.rows.read().expect("lock poisoned").get(uri).cloned())
    }

    fn latest(&self, limit: usize, before: Option<&FeedCursor>) -> IndexResult<Vec<PostRow>> {
        let rows = self.rows.read().expect("lock poisoned");
        let mut matching: Vec<&PostRow> = rows
            .values()
            .filter(|row| match before {
                Some(cursor) => {
                    (row.indexed_at.as_str(), row.uri.as_str())
                        < (cursor.indexed_at.as_str(), cursor.uri.as_str())
                }
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| (&b.indexed_at, &b.uri).cmp(&(&a.indexed_at, &a.uri)));
        Ok(matching.into_iter().take(limit).cloned().collect())
    }

    fn count(&self) -> IndexResult<u64> {
        Ok(self.rows.read().expect("lock poisoned").len() as u64)
    }
}
