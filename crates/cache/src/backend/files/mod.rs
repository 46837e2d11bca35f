//! Plain-file engine: one checksummed object file per key
//!
//! Objects live under `<store>/objects/<shard>/<sha256(key)>`, where the
//! shard is the first byte of the hash. Writes go through a temporary file
//! and a rename, so readers in other processes never see partial objects.

mod format;
mod reader;
mod writer;

pub use format::{StorageHeader, OBJECT_MAGIC, OBJECT_VERSION};

use super::{check_key, BackendOptions, CompressionConfig, StoreBackend, StoreHandle};
use crate::errors::{CacheError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

const NAME: &str = "files";

/// The file-per-key storage engine
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesBackend;

impl StoreBackend for FilesBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn identify(&self) -> String {
        format!("files v{OBJECT_VERSION}")
    }

    fn open(&self, path: &Path, options: &BackendOptions) -> Result<Box<dyn StoreHandle>> {
        let objects = path.join("objects");
        fs::create_dir_all(&objects)
            .map_err(|e| CacheError::io(&objects, "create object directory", e))?;

        Ok(Box::new(FilesHandle {
            base_dir: path.to_path_buf(),
            compression: options.compression,
        }))
    }
}

struct FilesHandle {
    base_dir: PathBuf,
    compression: CompressionConfig,
}

impl FilesHandle {
    /// Object path using 256-shard distribution
    fn object_path(&self, key: &[u8]) -> PathBuf {
        let hash = hash_key(key);
        let shard = &hash[..2];
        self.base_dir.join("objects").join(shard).join(&hash)
    }
}

impl StoreHandle for FilesHandle {
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        reader::read_object(&self.object_path(key), key)
    }

    fn store(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        check_key(key)?;
        writer::write_object(&self.object_path(key), key, value, &self.compression)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        check_key(key)?;
        let path = self.object_path(key);
        hcache_utils::remove_if_exists(&path).map_err(|e| CacheError::io(&path, "remove object file", e))
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Hex SHA-256 of a key
fn hash_key(key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key);
    format!("{:x}", hasher.finalize())
}
