//! Repository snapshots for Skyline.
//!
//! A commit event ships a CAR whose root is the account's signed commit. The
//! commit names the root of a Merkle Search Tree mapping record paths to
//! record CIDs. This crate opens such a snapshot and resolves a record path
//! to its block, using only the blocks that were shipped.
//!
//! # Key Types
//!
//! - [`RepoSnapshot`] -- commit plus block set, with record lookup
//! - [`SignedCommit`] -- the decoded commit object
//! - [`MstNode`] -- one decoded tree node
//! - [`RepoError`] -- including [`RepoError::IncompleteSnapshot`]

pub mod commit;
pub mod error;
pub mod mst;
pub mod snapshot;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use commit::{SignedCommit, SUPPORTED_VERSIONS};
pub use error::{RepoError, RepoResult};
pub use mst::{key_layer, lookup, MstEntry, MstNode};
pub use snapshot::RepoSnapshot;
