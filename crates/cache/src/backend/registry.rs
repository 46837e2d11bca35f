//! Compile-time table of the available engines

use super::StoreBackend;
use crate::errors::{CacheError, RecoveryHint, Result};

/// Engines in preference order; the first one is the default
static BACKENDS: &[&dyn StoreBackend] = &[
    #[cfg(feature = "lmdb")]
    &super::lmdb::LmdbBackend,
    #[cfg(feature = "redb")]
    &super::redb::RedbBackend,
    #[cfg(feature = "sqlite")]
    &super::sqlite::SqliteBackend,
    #[cfg(feature = "files")]
    &super::files::FilesBackend,
];

/// All engines compiled into this build, in preference order
pub fn backends() -> &'static [&'static dyn StoreBackend] {
    BACKENDS
}

/// Names of all engines compiled into this build
pub fn backend_names() -> Vec<&'static str> {
    BACKENDS.iter().map(|b| b.name()).collect()
}

pub fn default_backend() -> Option<&'static dyn StoreBackend> {
    BACKENDS.first().copied()
}

/// True iff `name` exactly matches a compiled-in engine (case-sensitive)
pub fn is_valid_backend_name(name: &str) -> bool {
    lookup(name).is_some()
}

/// Resolve a configured engine name.
///
/// `None` or an empty name selects the default engine.
pub fn resolve(name: Option<&str>) -> Result<&'static dyn StoreBackend> {
    match name.filter(|n| !n.is_empty()) {
        Some(name) => lookup(name).ok_or_else(|| {
            CacheError::configuration(
                format!(
                    "unknown header cache backend '{name}' (available: {})",
                    backend_names().join(", ")
                ),
                RecoveryHint::UseDefault {
                    value: default_backend()
                        .map(|b| b.name().to_string())
                        .unwrap_or_default(),
                },
            )
        }),
        None => default_backend().ok_or_else(|| {
            CacheError::configuration(
                "no header cache backend was compiled in",
                RecoveryHint::DisableCache,
            )
        }),
    }
}

fn lookup(name: &str) -> Option<&'static dyn StoreBackend> {
    BACKENDS.iter().copied().find(|b| b.name() == name)
}
