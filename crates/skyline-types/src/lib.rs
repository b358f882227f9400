//! Foundation types for Skyline.
//!
//! Every other Skyline crate depends on `skyline-types`. It holds the
//! identifiers that flow through the ingestion pipeline and the strict
//! DAG-CBOR helpers shared by the CAR reader, the repository walker, the
//! record classifier, and the frame decoder.
//!
//! # Key Types
//!
//! - [`Did`] -- repository (account) identifier
//! - [`RecordPath`] -- `<collection>/<rkey>` location inside a repository
//! - [`AtUri`] -- canonical record identifier, `at://<did>/<collection>/<rkey>`
//! - [`Cid`] -- content identifier of a block (re-exported from `cid`)

pub mod dag_cbor;
pub mod error;
pub mod identity;
pub mod link;
pub mod path;
pub mod temporal;

pub use error::{CborError, CborResult, TypeError};
pub use identity::Did;
pub use link::{cid_for, dag_cbor_cid, parse_cid, verify_cid, Cid, DAG_CBOR, RAW, SHA2_256};
pub use path::{AtUri, RecordPath};
pub use temporal::{format_datetime, normalize_datetime, now_timestamp, parse_datetime};
