//! Core error types for the header cache

use std::path::PathBuf;
use std::time::Duration;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Re-export CacheError as Error for convenience
pub use CacheError as Error;

/// Error type for header cache operations
#[derive(Debug)]
pub enum CacheError {
    /// I/O errors during cache operations
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// Encoding or decoding of a cached record failed
    Serialization {
        key: String,
        operation: SerializationOp,
        source: Box<dyn std::error::Error + Send + Sync>,
        recovery_hint: RecoveryHint,
    },

    /// Stored bytes failed a structural or checksum check
    Corruption {
        key: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// The cache handle is closed or was never opened
    StoreUnavailable {
        backend: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Blob was written with a different record layout
    VersionMismatch {
        key: String,
        expected_version: u32,
        actual_version: u32,
        recovery_hint: RecoveryHint,
    },

    /// Configuration error, detected before any I/O
    Configuration {
        message: String,
        recovery_hint: RecoveryHint,
    },

    /// Compression/decompression error
    Compression {
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
        recovery_hint: RecoveryHint,
    },

    /// Bounded wait elapsed
    Timeout {
        operation: &'static str,
        duration: Duration,
        recovery_hint: RecoveryHint,
    },

    /// Error reported by a storage engine
    Backend {
        backend: &'static str,
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
        recovery_hint: RecoveryHint,
    },
}

/// Recovery hints for error handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryHint {
    /// Retry the operation
    Retry { after: Duration },

    /// Delete the cache file and let it be rebuilt
    ClearAndRetry,

    /// Check file permissions
    CheckPermissions { path: PathBuf },

    /// Fall back to a default value
    UseDefault { value: String },

    /// Continue without a header cache
    DisableCache,

    /// No automated recovery possible
    Manual { instructions: String },

    /// Operation can be safely ignored
    Ignore,
}

/// Serialization operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationOp {
    Encode,
    Decode,
}

impl CacheError {
    /// Build a `Backend` error from any engine error
    pub fn backend<E>(backend: &'static str, operation: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Backend {
            backend,
            operation,
            source: source.into(),
            recovery_hint: RecoveryHint::DisableCache,
        }
    }

    /// Build an `Io` error bound to a path
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        let path = path.into();
        Self::Io {
            recovery_hint: RecoveryHint::CheckPermissions { path: path.clone() },
            path,
            operation,
            source,
        }
    }

    /// Build a `Corruption` error for a key
    pub fn corruption(key: &[u8], reason: impl Into<String>) -> Self {
        Self::Corruption {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: reason.into(),
            recovery_hint: RecoveryHint::ClearAndRetry,
        }
    }

    /// Build a `Configuration` error
    pub fn configuration(message: impl Into<String>, recovery_hint: RecoveryHint) -> Self {
        Self::Configuration {
            message: message.into(),
            recovery_hint,
        }
    }
}
