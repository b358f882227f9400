use thiserror::Error;

/// Errors produced when parsing identifiers and timestamps.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("invalid record path: {0}")]
    InvalidPath(String),

    #[error("invalid AT-URI: {0}")]
    InvalidUri(String),

    #[error("invalid CID: {0}")]
    InvalidCid(String),

    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },
}

/// Errors produced while decoding DAG-CBOR values.
#[derive(Debug, Error)]
pub enum CborError {
    #[error("cbor decode: {0}")]
    Decode(#[from] minicbor::decode::Error),

    #[error("indefinite-length CBOR not allowed")]
    IndefiniteLength,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("invalid CID link: {0}")]
    InvalidLink(String),

    #[error("nesting depth exceeds {0}")]
    TooDeep(usize),

    #[error("trailing bytes after value")]
    TrailingBytes,
}

pub type CborResult<T> = Result<T, CborError>;
