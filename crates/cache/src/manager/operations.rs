//! Cache operations - fetch, store and delete

use super::HeaderCache;
use crate::blob::{CachedHeader, Freshness};
use crate::errors::{CacheError, Result};
use crate::header::Header;

impl HeaderCache {
    /// Fetch and validate the record stored under `key`.
    ///
    /// Absent, stale and corrupt entries, engine errors and a closed cache
    /// all read as `None`.
    pub fn fetch(&self, key: &[u8]) -> Option<CachedHeader> {
        let blob = self.fetch_raw(key)?;

        match self.codec.decode(key, &blob) {
            Ok(cached) => Some(cached),
            Err(e @ CacheError::VersionMismatch { .. }) => {
                tracing::debug!("Discarding stale header cache entry: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!("Discarding unreadable header cache entry: {}", e);
                None
            }
        }
    }

    /// Fetch the stored bytes under `key` without any validation
    pub fn fetch_raw(&self, key: &[u8]) -> Option<Vec<u8>> {
        let handle = self.handle.as_ref()?;

        match handle.fetch(key) {
            Ok(Some(blob)) => Some(blob),
            Ok(None) => {
                tracing::trace!("Header cache miss for {:?}", String::from_utf8_lossy(key));
                None
            }
            Err(e) => {
                tracing::warn!("Header cache fetch failed: {}", e);
                None
            }
        }
    }

    /// Encode `header` and store it under `key`; the last store wins
    pub fn store(&mut self, key: &[u8], header: &Header, freshness: Freshness) -> Result<()> {
        let blob = self.codec.encode(header, freshness)?;
        self.store_raw(key, &blob)
    }

    /// Store bytes under `key` as they are
    pub fn store_raw(&mut self, key: &[u8], data: &[u8]) -> Result<()> {
        self.handle_mut()?.store(key, data)
    }

    /// Remove `key`; removing an absent key succeeds
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.handle_mut()?.delete(key)
    }
}
