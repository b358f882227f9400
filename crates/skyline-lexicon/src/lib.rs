//! Record classification for Skyline.
//!
//! Repository records are DAG-CBOR maps tagged with a `$type` schema
//! identifier. [`Record::decode`] reads that tag and dispatches: posts are
//! decoded into [`Post`], every other schema becomes [`Record::Other`] and is
//! ignored by the pipeline.

pub mod error;
pub mod post;
pub mod record;

pub use error::{LexiconError, LexiconResult};
pub use post::{Post, ReplyRef, StrongRef, POST_NSID};
pub use record::Record;
