//! Storage engine adapters
//!
//! Every engine presents the same narrow contract: open a store at a path,
//! then fetch, store and delete opaque byte values under opaque byte keys.
//! Engines never look inside values.
//!
//! Which engines exist is decided at build time through cargo features; see
//! [`registry`] for lookup by name.

pub mod compression;
pub mod registry;

#[cfg(feature = "files")]
pub mod files;
#[cfg(feature = "lmdb")]
pub mod lmdb;
#[cfg(feature = "redb")]
pub mod redb;
#[cfg(feature = "sqlite")]
pub mod sqlite;


pub use compression::{CompressionConfig, ValueCodec};
pub use registry::{backend_names, backends, default_backend, is_valid_backend_name, resolve};

use crate::errors::{CacheError, RecoveryHint, Result};
use std::path::Path;
use std::time::Duration;

/// Default database page size hint
pub const DEFAULT_PAGE_SIZE: u32 = 16384;

/// Default bound on waiting for an exclusive lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum size of memory-mapped stores
pub const DEFAULT_MAP_SIZE: usize = 256 * 1024 * 1024;

/// Largest map size accepted for memory-mapped stores
#[cfg(target_pointer_width = "64")]
pub const MAX_MAP_SIZE: usize = 1 << 40;
#[cfg(not(target_pointer_width = "64"))]
pub const MAX_MAP_SIZE: usize = 1 << 30;

/// Longest key accepted by every engine; LMDB's compiled-in limit
pub const MAX_KEY_LEN: usize = 511;

/// Refuse keys some engine could not hold: empty, or longer than
/// `MAX_KEY_LEN`. Every handle checks this before touching its store.
pub fn check_key(key: &[u8]) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(CacheError::configuration(
            format!("key of {} bytes is outside 1..={MAX_KEY_LEN}", key.len()),
            RecoveryHint::Manual {
                instructions: "Use a shorter, non-empty message key".to_string(),
            },
        ));
    }
    Ok(())
}

/// Tuning passed to an engine when a store is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOptions {
    /// Page size for engines that take one at creation time
    pub page_size: u32,
    pub compression: CompressionConfig,
    /// Bound on waiting for locks held by other processes
    pub lock_timeout: Duration,
    /// Maximum size of memory-mapped stores
    pub map_size: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            compression: CompressionConfig::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            map_size: DEFAULT_MAP_SIZE,
        }
    }
}

/// A storage engine that can open stores
pub trait StoreBackend: Send + Sync {
    /// Unique lowercase name used for selection
    fn name(&self) -> &'static str;

    /// Engine name and version, for display
    fn identify(&self) -> String;

    /// Open or create the store at `path`.
    ///
    /// Missing parent directories are the caller's concern. On error no
    /// lock or handle stays held.
    fn open(&self, path: &Path, options: &BackendOptions) -> Result<Box<dyn StoreHandle>>;
}

/// An open store
///
/// Keys are opaque byte strings of 1 to `MAX_KEY_LEN` bytes; every
/// operation refuses other keys with a `Configuration` error. Values fetched are owned copies, independent of the engine's buffers.
pub trait StoreHandle: Send {
    /// Value stored under `key`, `None` if absent
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert or replace the value under `key`
    fn store(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Flush and release the store and any locks held for it
    fn close(self: Box<Self>) -> Result<()>;
}
