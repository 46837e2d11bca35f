//! Advisory lock files guarding stores that are unsafe for concurrent
//! multi-process opens

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Interval between two non-blocking lock attempts
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An exclusive advisory lock held on a side file.
///
/// The lock is released when the value is dropped, on every exit path.
#[derive(Debug)]
pub struct LockFile {
    lock_file: File,
    lock_path: PathBuf,
    pid: u32,
}

impl LockFile {
    /// Try to acquire the lock once without waiting
    pub fn try_acquire(lock_path: &Path) -> io::Result<Self> {
        let mut lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        lock_file.try_lock_exclusive()?;

        // We got the lock, record our PID for diagnostics
        let pid = std::process::id();
        lock_file.set_len(0)?;
        writeln!(lock_file, "{pid}")?;

        Ok(Self {
            lock_file,
            lock_path: lock_path.to_path_buf(),
            pid,
        })
    }

    /// Acquire the lock, polling until `timeout` has elapsed.
    ///
    /// Returns `ErrorKind::TimedOut` when another holder keeps the lock for
    /// longer than `timeout`.
    pub fn acquire(lock_path: &Path, timeout: Duration) -> io::Result<Self> {
        let deadline = Instant::now() + timeout;

        loop {
            match Self::try_acquire(lock_path) {
                Ok(lock) => return Ok(lock),
                Err(e) if is_contended(&e) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::debug!(
                            "Gave up waiting for lock {} after {:?}",
                            lock_path.display(),
                            timeout
                        );
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("lock {} is held by another process", lock_path.display()),
                        ));
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Get the PID that owns this lock
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get the path of the lock file
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // The file itself stays: unlinking it would let a waiter lock an
        // orphaned inode while a newcomer locks a fresh one.
        let _ = FileExt::unlock(&self.lock_file);
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
