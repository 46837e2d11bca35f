//! Persistent header cache for mail clients
//!
//! This crate caches parsed per-message header state on disk so a mailbox
//! can be reopened without re-fetching and re-parsing every message:
//! - Interchangeable storage engines behind one small contract
//! - Stamped blobs that are never decoded against a different layout
//! - Per-mailbox cache location with pluggable naming
//!
//! ```no_run
//! use hcache::{Freshness, HcacheConfig, Header, HeaderCache};
//!
//! let mut cache = HeaderCache::open("/tmp/hcache/", "INBOX", None, &HcacheConfig::default());
//! cache.store(b"42", &Header::with_subject("Hi"), Freshness::Marker(1)).ok();
//! let hit = cache.fetch(b"42");
//! ```

pub mod backend;
pub mod blob;
pub mod config;
pub mod errors;
pub mod header;
pub mod manager;

pub use backend::{BackendOptions, StoreBackend, StoreHandle};
pub use blob::{restore, BlobCodec, CachedHeader, Freshness, SchemaFingerprint};
pub use config::{HcacheConfig, HcacheConfigBuilder, HcacheConfigLoader};
pub use errors::{CacheError, Error, RecoveryHint, Result};
pub use header::{
    Address, Body, ContentType, Disposition, Envelope, Header, MessageFlags, Parameter,
    TransferEncoding,
};
pub use manager::{
    available_backends, backend_identifier, default_root, is_valid_backend_name, HeaderCache,
    NamingPolicy,
};
