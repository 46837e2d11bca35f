//! LMDB engine through `heed`
//!
//! LMDB environments are not safe to open concurrently from several
//! processes while one of them may be creating the environment, so every
//! open is serialized through an advisory lock on `<path>-lock-hack`.

use super::{
    check_key, BackendOptions, StoreBackend, StoreHandle, DEFAULT_MAP_SIZE, MAX_MAP_SIZE,
};
use crate::errors::{CacheError, RecoveryHint, Result};
use hcache_utils::LockFile;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const NAME: &str = "lmdb";

/// LMDB release line bundled by heed
const LMDB_VERSION: &str = "0.9";

/// Map sizes are rounded up to this, a multiple of every common OS page size
const MAP_SIZE_ALIGN: usize = 64 * 1024;

/// The LMDB storage engine
#[derive(Debug, Clone, Copy, Default)]
pub struct LmdbBackend;

/// Path of the side file used to serialize opens of `path`
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push("-lock-hack");
    PathBuf::from(name)
}

/// Round `requested` up to the map alignment, refusing sizes past `MAX_MAP_SIZE`
fn aligned_map_size(requested: usize) -> Result<usize> {
    requested
        .max(1)
        .checked_next_multiple_of(MAP_SIZE_ALIGN)
        .filter(|size| *size <= MAX_MAP_SIZE)
        .ok_or_else(|| {
            CacheError::configuration(
                format!("lmdb map size {requested} exceeds {MAX_MAP_SIZE}"),
                RecoveryHint::UseDefault {
                    value: DEFAULT_MAP_SIZE.to_string(),
                },
            )
        })
}

impl StoreBackend for LmdbBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn identify(&self) -> String {
        format!("lmdb {LMDB_VERSION} (heed)")
    }

    fn open(&self, path: &Path, options: &BackendOptions) -> Result<Box<dyn StoreHandle>> {
        let map_size = aligned_map_size(options.map_size)?;
        let lock_path = lock_path(path);
        let lock = LockFile::acquire(&lock_path, options.lock_timeout).map_err(|e| {
            if e.kind() == io::ErrorKind::TimedOut {
                CacheError::Timeout {
                    operation: "acquire lmdb open lock",
                    duration: options.lock_timeout,
                    recovery_hint: RecoveryHint::Retry {
                        after: options.lock_timeout,
                    },
                }
            } else {
                CacheError::io(&lock_path, "open lock file", e)
            }
        })?;

        tracing::debug!("Acquired {} for {}", lock.path().display(), path.display());

        fs::create_dir_all(path).map_err(|e| CacheError::io(path, "create lmdb directory", e))?;

        // The lock file above guarantees no other process is opening this
        // environment concurrently, and each handle opens it only once.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path)
        }
        .map_err(|e| CacheError::backend(NAME, "open environment", e))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| CacheError::backend(NAME, "begin write transaction", e))?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| CacheError::backend(NAME, "open database", e))?;
        wtxn.commit()
            .map_err(|e| CacheError::backend(NAME, "commit", e))?;

        Ok(Box::new(LmdbHandle { db, env, lock }))
    }
}

/// An open LMDB environment; `lock` is released after `env` is closed
struct LmdbHandle {
    db: Database<Bytes, Bytes>,
    env: Env,
    lock: LockFile,
}

impl StoreHandle for LmdbHandle {
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| CacheError::backend(NAME, "begin read transaction", e))?;

        let value = self
            .db
            .get(&rtxn, key)
            .map_err(|e| CacheError::backend(NAME, "fetch", e))?;

        Ok(value.map(<[u8]>::to_vec))
    }

    fn store(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        check_key(key)?;
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| CacheError::backend(NAME, "begin write transaction", e))?;
        self.db
            .put(&mut wtxn, key, value)
            .map_err(|e| CacheError::backend(NAME, "store", e))?;
        wtxn.commit()
            .map_err(|e| CacheError::backend(NAME, "commit", e))
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        check_key(key)?;
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| CacheError::backend(NAME, "begin write transaction", e))?;
        self.db
            .delete(&mut wtxn, key)
            .map_err(|e| CacheError::backend(NAME, "delete", e))?;
        wtxn.commit()
            .map_err(|e| CacheError::backend(NAME, "commit", e))
    }

    fn close(self: Box<Self>) -> Result<()> {
        let Self { env, lock, .. } = *self;
        env.prepare_for_closing().wait();
        tracing::debug!("Released {}", lock.path().display());
        drop(lock);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/tmp/cache/inbox")),
            PathBuf::from("/tmp/cache/inbox-lock-hack")
        );
    }

    #[test]
    fn test_map_size_alignment() {
        assert_eq!(aligned_map_size(0).unwrap(), MAP_SIZE_ALIGN);
        assert_eq!(aligned_map_size(MAP_SIZE_ALIGN).unwrap(), MAP_SIZE_ALIGN);
        assert_eq!(aligned_map_size(MAP_SIZE_ALIGN + 1).unwrap(), 2 * MAP_SIZE_ALIGN);
        assert_eq!(aligned_map_size(MAX_MAP_SIZE).unwrap(), MAX_MAP_SIZE);

        assert!(aligned_map_size(MAX_MAP_SIZE + 1).unwrap_err().is_configuration());
        assert!(aligned_map_size(usize::MAX).unwrap_err().is_configuration());
    }

    #[test]
    fn test_oversized_map_is_refused_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("inbox");
        let options = BackendOptions {
            map_size: usize::MAX,
            ..BackendOptions::default()
        };

        let err = LmdbBackend.open(&path, &options).err().unwrap();
        assert!(err.is_configuration());
        assert!(!path.exists());
        assert!(!lock_path(&path).exists());
    }

    #[test]
    fn test_open_waits_for_lock_then_gives_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("inbox");
        let options = BackendOptions {
            lock_timeout: Duration::from_millis(200),
            map_size: 1024 * 1024,
            ..BackendOptions::default()
        };

        let held = LockFile::try_acquire(&lock_path(&path)).unwrap();

        let start = Instant::now();
        let err = LmdbBackend.open(&path, &options).err().unwrap();
        assert!(matches!(err, CacheError::Timeout { .. }));
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(err.is_transient());

        drop(held);
        let handle = LmdbBackend.open(&path, &options).unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_lock_released_on_close() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("inbox");
        let options = BackendOptions {
            map_size: 1024 * 1024,
            ..BackendOptions::default()
        };

        let mut handle = LmdbBackend.open(&path, &options).unwrap();
        assert!(LockFile::try_acquire(&lock_path(&path)).is_err());

        handle.store(b"k", b"v").unwrap();
        handle.close().unwrap();

        let lock = LockFile::try_acquire(&lock_path(&path)).unwrap();
        drop(lock);

        let handle = LmdbBackend.open(&path, &options).unwrap();
        assert_eq!(handle.fetch(b"k").unwrap(), Some(b"v".to_vec()));
        handle.close().unwrap();
    }

    #[test]
    fn test_identify() {
        assert!(LmdbBackend.identify().starts_with("lmdb 0.9"));
    }
}
