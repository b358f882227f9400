use skyline_types::{CborError, Cid, TypeError};

/// Errors from block store and CAR operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Block bytes do not hash to their CID (data corruption or forgery).
    #[error("hash mismatch for block {0}")]
    HashMismatch(Cid),

    /// The CID uses a hash function that cannot be verified.
    #[error("unverifiable CID: {0}")]
    Unverifiable(#[from] TypeError),

    /// Input ended before a declared length was satisfied.
    #[error("truncated CAR: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A length prefix is not a valid unsigned varint.
    #[error("malformed varint at offset {0}")]
    Varint(usize),

    /// The CAR header declares a version other than 1.
    #[error("unsupported CAR version {0}")]
    UnsupportedVersion(i64),

    /// A section's CID prefix could not be parsed.
    #[error("invalid CID in CAR section at offset {offset}: {reason}")]
    InvalidCid { offset: usize, reason: String },

    /// The CAR header is not valid DAG-CBOR.
    #[error("malformed CAR header: {0}")]
    Header(#[from] CborError),

    /// The CAR exceeds a configured limit.
    #[error("CAR limit exceeded: {0}")]
    LimitExceeded(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
