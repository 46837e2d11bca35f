use super::*;
use crate::blob::{Freshness, SchemaFingerprint};
use crate::config::HcacheConfigBuilder;
use crate::header::Header;
use tempfile::TempDir;

fn config_for(backend: &str) -> HcacheConfig {
    HcacheConfigBuilder::new()
        .with_backend(backend)
        .with_map_size(4 * 1024 * 1024)
        .build()
}

#[test]
fn test_disabled_cache() {
    let mut cache = HeaderCache::disabled();

    assert!(!cache.is_open());
    assert_eq!(cache.backend_name(), None);
    assert_eq!(cache.path(), None);
    assert!(cache.fetch(b"1").is_none());
    assert!(cache.fetch_raw(b"1").is_none());

    let err = cache
        .store(b"1", &Header::with_subject("Hi"), Freshness::Marker(1))
        .unwrap_err();
    assert!(matches!(err, CacheError::StoreUnavailable { .. }));
    assert!(cache.delete(b"1").is_err());

    cache.close();
    cache.close();
}

#[test]
fn test_open_with_unknown_backend_is_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("cache");

    let cache = HeaderCache::open(&root, "Inbox", None, &config_for("zzz"));
    assert!(!cache.is_open());
    assert!(!root.exists());

    let err = HeaderCache::try_open(&root, "Inbox", None, &config_for("zzz")).unwrap_err();
    assert!(err.is_configuration());
    assert!(!root.exists());
}

#[test]
fn test_close_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    for name in available_backends() {
        let root = temp_dir.path().join(name);
        let mut cache = HeaderCache::try_open(&root, "Inbox", None, &config_for(name)).unwrap();

        cache
            .store(b"1", &Header::with_subject("Hi"), Freshness::Marker(1))
            .unwrap();
        cache.close();
        cache.close();

        assert!(!cache.is_open());
        assert_eq!(cache.backend_name(), Some(name));
        assert!(cache.fetch(b"1").is_none());
        assert!(matches!(
            cache.store_raw(b"2", b"raw"),
            Err(CacheError::StoreUnavailable { .. })
        ));
    }
}

#[test]
fn test_stale_fingerprint_reads_as_miss() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("inbox");
    let config = config_for(available_backends()[0]);

    let mut cache = HeaderCache::try_open(&root, "Inbox", None, &config).unwrap();
    cache
        .store(b"1", &Header::with_subject("Hi"), Freshness::Marker(7))
        .unwrap();
    cache.close();

    let cache = HeaderCache::try_open(&root, "Inbox", None, &config)
        .unwrap()
        .with_codec(BlobCodec::with_fingerprint(SchemaFingerprint::from_raw(0)));
    assert!(cache.fetch(b"1").is_none());
    // Raw bytes are still there for callers with their own policy
    let raw = cache.fetch_raw(b"1").unwrap();
    assert_eq!(crate::blob::restore(&raw).unwrap().freshness, 7);
}

#[test]
fn test_backend_identifier() {
    let default = backend_identifier(&HcacheConfig::default()).unwrap();
    assert!(default.starts_with(available_backends()[0]));

    assert!(backend_identifier(&config_for("zzz")).is_err());
}

#[cfg(feature = "lmdb")]
#[test]
fn test_drop_releases_lmdb_lock() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("inbox");
    let config = HcacheConfigBuilder::from_config(config_for("lmdb"))
        .with_lock_timeout(std::time::Duration::from_millis(100))
        .build();

    let cache = HeaderCache::try_open(&root, "Inbox", None, &config).unwrap();
    assert!(HeaderCache::try_open(&root, "Inbox", None, &config).is_err());

    drop(cache);
    let cache = HeaderCache::try_open(&root, "Inbox", None, &config).unwrap();
    assert!(cache.is_open());
}

#[cfg(feature = "lmdb")]
#[test]
fn test_oversized_map_size_leaves_cache_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("inbox");
    let config = HcacheConfigBuilder::new()
        .with_backend("lmdb")
        .with_map_size(usize::MAX)
        .build();

    let cache = HeaderCache::open(&root, "Inbox", None, &config);
    assert!(!cache.is_open());

    let err = HeaderCache::try_open(&root, "Inbox", None, &config).unwrap_err();
    assert!(err.is_configuration());
}
