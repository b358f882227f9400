use skyline_types::CborError;
use thiserror::Error;

/// Errors produced while classifying a record block.
#[derive(Debug, Error)]
pub enum LexiconError {
    /// The block is not a map, or its `$type` cannot be read.
    #[error("unreadable record: {0}")]
    Unreadable(#[from] CborError),

    #[error("record has no $type")]
    MissingType,

    /// The record claims a known schema but does not match it.
    #[error("malformed {nsid} record: {source}")]
    Malformed {
        nsid: &'static str,
        source: CborError,
    },
}

pub type LexiconResult<T> = Result<T, LexiconError>;
