//! Display implementations for cache errors

use super::types::CacheError;
use std::fmt;

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                path,
                operation,
                source,
                ..
            } => write!(
                f,
                "I/O error during {} on '{}': {}",
                operation,
                path.display(),
                source
            ),
            Self::Serialization {
                key,
                operation,
                source,
                ..
            } => write!(f, "Failed to {operation:?} header cache entry '{key}': {source}"),
            Self::Corruption { key, reason, .. } => {
                write!(f, "Header cache corruption detected for key '{key}': {reason}")
            }
            Self::StoreUnavailable {
                backend, reason, ..
            } => write!(f, "Header cache backend '{backend}' unavailable: {reason}"),
            Self::VersionMismatch {
                key,
                expected_version,
                actual_version,
                ..
            } => write!(
                f,
                "Schema mismatch for key '{key}': expected {expected_version:08x}, found {actual_version:08x}"
            ),
            Self::Configuration { message, .. } => {
                write!(f, "Header cache configuration error: {message}")
            }
            Self::Compression {
                operation, source, ..
            } => write!(f, "Compression error during {operation}: {source}"),
            Self::Timeout {
                operation,
                duration,
                ..
            } => write!(f, "Timed out during {operation} after {duration:?}"),
            Self::Backend {
                backend,
                operation,
                source,
                ..
            } => write!(f, "{backend} backend failed to {operation}: {source}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization { source, .. } => Some(source.as_ref()),
            Self::Compression { source, .. } => Some(source.as_ref()),
            Self::Backend { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
