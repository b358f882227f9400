//! Post index for Skyline.
//!
//! Stores one row per indexed post keyed by its `at://` URI. Inserts are
//! first-write-wins: re-observing a post, or an update to it, never modifies
//! the stored row. [`SqlitePostIndex`] is the durable implementation;
//! [`IndexWriter`] wraps any [`PostIndex`] with retry of busy/locked errors.

pub mod config;
pub mod error;
pub mod memory;
pub mod row;
pub mod sqlite;
pub mod traits;
pub mod writer;

pub use config::StorageConfig;
pub use error::{IndexError, IndexResult};
pub use memory::InMemoryPostIndex;
pub use row::{reply_uris, FeedCursor, InsertOutcome, PostRow};
pub use sqlite::SqlitePostIndex;
pub use traits::PostIndex;
pub use writer::{BatchOutcome, IndexWriter, RetryPolicy};
