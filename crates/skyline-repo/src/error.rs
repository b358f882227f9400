use skyline_store::StoreError;
use skyline_types::{CborError, Cid, TypeError};

/// Errors produced while reading a repository snapshot.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// A block needed to reach the record is not in the block set.
    #[error("incomplete snapshot: block {cid} is not in the block set")]
    IncompleteSnapshot { cid: Cid },

    /// The CAR declares no root commit.
    #[error("block set declares no root")]
    MissingRoot,

    #[error("unsupported repository version {0}")]
    UnsupportedVersion(i64),

    #[error("malformed commit {cid}: {source}")]
    Commit { cid: Cid, source: CborError },

    #[error("malformed MST node {cid}: {reason}")]
    Node { cid: Cid, reason: String },

    /// The walk went deeper than any well-formed tree can.
    #[error("MST walk exceeded {0} levels")]
    TooDeep(usize),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid identifier: {0}")]
    Type(#[from] TypeError),
}

impl RepoError {
    /// Whether the error only means the snapshot lacks a block.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::IncompleteSnapshot { .. })
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
