//! Content-addressed block storage for Skyline.
//!
//! Every commit event on the firehose carries a self-contained block set: a
//! CAR file holding exactly the blocks needed to resolve the records that
//! commit touches. This crate reads those CAR files into a CID-keyed store
//! and offers the [`BlockStore`] trait the repository walker reads through.
//!
//! # Design Rules
//!
//! 1. Blocks are immutable and verified against their CID on the way in.
//! 2. Lookups never leave the store: an absent block is reported, not fetched.
//! 3. The store never interprets block contents.

pub mod block;
pub mod car;
pub mod error;
pub mod memory;
pub mod traits;

pub use block::Block;
pub use car::{CarFile, CarLimits, CarWriter};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBlockStore;
pub use traits::BlockStore;
