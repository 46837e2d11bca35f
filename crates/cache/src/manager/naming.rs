//! Mapping a mailbox to the on-disk location of its cache

use crate::errors::{CacheError, RecoveryHint, Result};
use hcache_utils::XdgPaths;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Caller-supplied mapping from a mailbox name to a relative cache file name
pub type NamingPolicy<'a> = &'a dyn Fn(&str) -> String;

/// Default cache file name: lowercase hex SHA-256 of the mailbox name
pub fn default_name(mailbox: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mailbox.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Per-user directory root for mailbox caches.
///
/// Carries a trailing separator so [`cache_path`] treats it as a directory
/// even before it exists.
pub fn default_root() -> PathBuf {
    let mut root = XdgPaths::header_cache_dir().into_os_string();
    root.push(std::path::MAIN_SEPARATOR_STR);
    PathBuf::from(root)
}

/// Resolve where the cache for `mailbox` lives.
///
/// `root` names the cache itself when it is an existing non-directory, or
/// when it does not exist and lacks a trailing separator. Otherwise it is a
/// directory holding one cache per mailbox.
pub fn cache_path(root: &Path, mailbox: &str, namer: Option<NamingPolicy<'_>>) -> Result<PathBuf> {
    let is_file_target = if root.exists() {
        !root.is_dir()
    } else {
        !has_trailing_separator(root)
    };

    if is_file_target {
        return Ok(root.to_path_buf());
    }

    let name = match namer {
        Some(namer) => namer(mailbox),
        None => default_name(mailbox),
    };

    if !is_contained(Path::new(&name)) {
        return Err(CacheError::configuration(
            format!("naming policy produced unusable name {name:?} for mailbox {mailbox:?}"),
            RecoveryHint::UseDefault {
                value: default_name(mailbox),
            },
        ));
    }

    Ok(root.join(name))
}

/// Create the directories leading to `path`
pub fn create_parent_dirs(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| CacheError::io(parent, "create cache directory", e)),
        _ => Ok(()),
    }
}

/// Whether `name` names something strictly below the directory it is joined to
fn is_contained(name: &Path) -> bool {
    name.components().any(|c| matches!(c, Component::Normal(_)))
        && name
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn has_trailing_separator(path: &Path) -> bool {
    let raw = path.as_os_str().to_string_lossy();
    raw.ends_with('/') || raw.ends_with(std::path::MAIN_SEPARATOR)
}
