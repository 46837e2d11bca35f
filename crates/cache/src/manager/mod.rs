//! Header cache manager: one open cache per mailbox
//!
//! Composes the blob codec with an engine picked from the registry. Every
//! read failure (absence, stale stamp, corruption, engine error, closed
//! handle) is reported to the caller as a miss.

mod naming;
mod operations;

pub use naming::{cache_path, default_name, default_root, NamingPolicy};

use crate::backend::{self, StoreBackend, StoreHandle};
use crate::blob::BlobCodec;
use crate::config::HcacheConfig;
use crate::errors::{CacheError, RecoveryHint, Result};
use std::fmt;
use std::path::{Path, PathBuf};

pub use crate::backend::is_valid_backend_name;

/// An open (or disabled) header cache for one mailbox
pub struct HeaderCache {
    backend: Option<&'static dyn StoreBackend>,
    handle: Option<Box<dyn StoreHandle>>,
    codec: BlobCodec,
    path: Option<PathBuf>,
}

impl HeaderCache {
    /// Open the cache for `mailbox` under `root`.
    ///
    /// Never fails: any error is logged and a disabled cache is returned, on
    /// which every fetch misses and every store fails.
    pub fn open(
        root: impl AsRef<Path>,
        mailbox: &str,
        namer: Option<NamingPolicy<'_>>,
        config: &HcacheConfig,
    ) -> Self {
        let root = root.as_ref();
        match Self::try_open(root, mailbox, namer, config) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!(
                    "Header cache for {:?} under {} unavailable: {}",
                    mailbox,
                    root.display(),
                    e
                );
                Self::disabled()
            }
        }
    }

    /// Open the cache for `mailbox` under `root`, reporting failures.
    ///
    /// The engine is resolved before anything touches the filesystem, so an
    /// unknown engine name creates nothing.
    pub fn try_open(
        root: impl AsRef<Path>,
        mailbox: &str,
        namer: Option<NamingPolicy<'_>>,
        config: &HcacheConfig,
    ) -> Result<Self> {
        let backend = backend::resolve(config.backend.as_deref())?;
        let path = naming::cache_path(root.as_ref(), mailbox, namer)?;
        naming::create_parent_dirs(&path)?;

        let handle = backend.open(&path, &config.backend_options())?;

        tracing::debug!(
            "Opened {} header cache for {:?} at {}",
            backend.name(),
            mailbox,
            path.display()
        );

        Ok(Self {
            backend: Some(backend),
            handle: Some(handle),
            codec: BlobCodec::new(),
            path: Some(path),
        })
    }

    /// A cache that was never opened
    pub fn disabled() -> Self {
        Self {
            backend: None,
            handle: None,
            codec: BlobCodec::new(),
            path: None,
        }
    }

    /// Validate blobs with `codec` instead of the current schema
    pub fn with_codec(mut self, codec: BlobCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Short name of the engine, if one was resolved
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.map(|b| b.name())
    }

    /// Engine name and version, if one was resolved
    pub fn identify(&self) -> Option<String> {
        self.backend.map(|b| b.identify())
    }

    /// Location of the cache on disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Release the engine handle and its locks. Idempotent.
    pub fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let name = self.backend_name().unwrap_or("none");
        match handle.close() {
            Ok(()) => tracing::debug!("Closed {} header cache", name),
            Err(e) => tracing::warn!("Closing {} header cache failed: {}", name, e),
        }
    }

    fn handle_mut(&mut self) -> Result<&mut Box<dyn StoreHandle>> {
        let backend = self.backend_name().unwrap_or("none");
        self.handle.as_mut().ok_or_else(|| CacheError::StoreUnavailable {
            backend: backend.to_string(),
            reason: "header cache is closed".to_string(),
            recovery_hint: RecoveryHint::DisableCache,
        })
    }
}

impl Drop for HeaderCache {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for HeaderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderCache")
            .field("backend", &self.backend_name())
            .field("open", &self.is_open())
            .field("path", &self.path)
            .field("fingerprint", &self.codec.fingerprint())
            .finish()
    }
}

/// Identification string of the engine `config` selects, without opening it
pub fn backend_identifier(config: &HcacheConfig) -> Result<String> {
    Ok(backend::resolve(config.backend.as_deref())?.identify())
}

/// Names of the engines compiled into this build
pub fn available_backends() -> Vec<&'static str> {
    backend::backend_names()
}

#[cfg(test)]
mod tests;
