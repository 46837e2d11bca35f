//! Error handling for the header cache
//!
//! Every error carries a recovery hint. Callers of the cache manager rarely
//! see these directly: misses, stale entries and corrupt blobs are folded
//! into "not found" at that boundary, and only store/delete/open failures
//! are reported.

mod conversions;
mod display;
mod recovery;
mod types;

pub use types::*;
