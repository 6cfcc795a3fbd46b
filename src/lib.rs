//! # imgvault
//!
//! A per-user image store with a small set of intensity transforms.
//! Clients upload images, ask for any combination of four transforms, and
//! download originals or processed variants, one at a time or in batches.
//!
//! # Architecture: Validate, Dispatch, Store
//!
//! ```text
//! batch items ─► validate ─► pipeline (uploads)     ─► store
//!                          └ resolve + re-encode (downloads) ─► bytes / zip
//! ```
//!
//! A request selects what it wants with five flags, the *selection vector*
//! `[Original, HistEq, ContrastStretch, LogComp, ReverseVideo]`. Its
//! five-character `0`/`1` form, the *signature*, identifies a processed
//! variant of a filename in the store.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`signature`] | Selection vectors, their signature strings, step-name mapping |
//! | [`imaging`] | Codec backend, lookup-table transforms, the fixed-order pipeline |
//! | [`store`] | Per-user originals and variants, JSON-backed, explicit open/save/close |
//! | [`validate`] | Per-item checks for upload and download batch items |
//! | [`batch`] | Upload and download loops with per-item status codes |
//! | [`archive`] | Zip packaging of multi-item downloads, zip expansion of uploads |
//! | [`api`] | Typed request records and route handlers |
//! | [`naming`] | Path lists and archive entry names |
//! | [`config`] | `imgvault.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting for reports and listings |
//!
//! # Design Decisions
//!
//! ## Fixed Transform Order
//!
//! However the flags were supplied, enabled transforms always run as
//! Histogram Equalization → Contrast Stretching → Log Compression →
//! Reverse Video, each on the previous step's output. Two requests with the
//! same flags therefore always produce the same variant, which is what lets
//! the signature act as the variant's identity.
//!
//! ## Explicit Store Handle
//!
//! The [`store::VersionStore`] is opened, passed by `&mut` into whatever
//! needs it, and saved or closed explicitly. There is no process-wide
//! connection. One handle means one writer, so the per-key uniqueness of
//! originals and variants holds without locks.
//!
//! ## Per-Item Failure
//!
//! A batch never aborts on a bad item. Each position gets its own status
//! code and message, index-aligned with the input, and the loop continues.
//! Only archive packaging fails a download batch as a whole, and then no
//! partial archive is left behind.

pub mod api;
pub mod archive;
pub mod batch;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod signature;
pub mod store;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
