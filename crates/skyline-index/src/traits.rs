use crate::error::IndexResult;
use crate::row::{FeedCursor, InsertOutcome, PostRow};

/// Durable post storage keyed by canonical URI.
///
/// All implementations must satisfy these invariants:
/// - `insert_if_absent` never modifies an existing row: the first write of a
///   URI wins.
/// - `latest` orders by `indexedAt` descending, ties broken by `uri`
///   descending, and only returns rows strictly after `before`.
pub trait PostIndex: Send + Sync {
    /// Create the schema if it does not exist yet. Idempotent.
    fn migrate(&self) -> IndexResult<()>;

    fn insert_if_absent(&self, row: &PostRow) -> IndexResult<InsertOutcome>;

    /// Insert a batch as one unit: either every row is attempted or none is.
    fn insert_batch(&self, rows: &[PostRow]) -> IndexResult<Vec<InsertOutcome>> {
        rows.iter().map(|row| self.insert_if_absent(row)).collect()
    }

    fn get(&self, uri: &str) -> IndexResult<Option<PostRow>>;

    /// Most recently indexed rows, newest first.
    fn latest(&self, limit: usize, before: Option<&FeedCursor>) -> IndexResult<Vec<PostRow>>;

    fn count(&self) -> IndexResult<u64>;
}
