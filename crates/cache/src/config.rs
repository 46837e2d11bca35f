//! Header cache configuration with precedence and validation
//!
//! Precedence, lowest first: built-in defaults, the `"header_cache"` object of
//! `$XDG_CONFIG_HOME/hcache/config.json`, then `HCACHE_*` environment
//! variables.

use crate::backend::compression::DEFAULT_COMPRESSION_LEVEL;
use crate::backend::{
    is_valid_backend_name, BackendOptions, CompressionConfig, DEFAULT_LOCK_TIMEOUT,
    DEFAULT_MAP_SIZE, DEFAULT_PAGE_SIZE, MAX_MAP_SIZE,
};
use crate::errors::{Error, RecoveryHint, Result};
use hcache_utils::XdgPaths;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_BACKEND: &str = "HCACHE_BACKEND";
pub const ENV_PAGE_SIZE: &str = "HCACHE_PAGESIZE";
pub const ENV_COMPRESS: &str = "HCACHE_COMPRESS";
pub const ENV_COMPRESSION_LEVEL: &str = "HCACHE_COMPRESSION_LEVEL";
pub const ENV_LOCK_TIMEOUT_MS: &str = "HCACHE_LOCK_TIMEOUT_MS";
pub const ENV_MAP_SIZE: &str = "HCACHE_MAP_SIZE";

/// Smallest and largest page sizes accepted as a hint
const PAGE_SIZE_RANGE: std::ops::RangeInclusive<u32> = 512..=65536;

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Default configuration
    Default,
    /// Configuration file
    ConfigFile(PathBuf),
    /// Environment variables
    Environment,
    /// Set programmatically
    Builder,
}

/// Settings for opening header caches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HcacheConfig {
    /// Engine name; `None` selects the first compiled-in engine
    pub backend: Option<String>,
    /// Page size hint for engines that take one at creation
    pub page_size: Option<u32>,
    /// Compress stored values
    pub compress: bool,
    pub compression_level: i32,
    /// Bound on waiting for another process's lock
    pub lock_timeout: Duration,
    /// Maximum size of memory-mapped stores, in bytes
    pub map_size: usize,
    /// Where the last applied settings came from
    pub source: ConfigSource,
}

impl Default for HcacheConfig {
    fn default() -> Self {
        Self {
            backend: None,
            page_size: None,
            compress: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            map_size: DEFAULT_MAP_SIZE,
            source: ConfigSource::Default,
        }
    }
}

/// Whether `size` is usable as a page size hint
pub fn is_valid_page_size(size: u32) -> bool {
    size.is_power_of_two() && PAGE_SIZE_RANGE.contains(&size)
}

/// Whether `size` is usable as a memory map size
pub fn is_valid_map_size(size: usize) -> bool {
    (1..=MAX_MAP_SIZE).contains(&size)
}

impl HcacheConfig {
    /// Report unknown backends and out-of-range tuning values
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = self.backend.as_deref().filter(|n| !n.is_empty()) {
            if !is_valid_backend_name(name) {
                return Err(Error::configuration(
                    format!("unknown header cache backend '{name}'"),
                    RecoveryHint::UseDefault {
                        value: crate::backend::backend_names()
                            .first()
                            .map(|n| n.to_string())
                            .unwrap_or_default(),
                    },
                ));
            }
        }

        if let Some(size) = self.page_size {
            if !is_valid_page_size(size) {
                return Err(Error::configuration(
                    format!(
                        "page size {size} must be a power of two between {} and {}",
                        PAGE_SIZE_RANGE.start(),
                        PAGE_SIZE_RANGE.end()
                    ),
                    RecoveryHint::UseDefault {
                        value: DEFAULT_PAGE_SIZE.to_string(),
                    },
                ));
            }
        }

        if !(1..=22).contains(&self.compression_level) {
            return Err(Error::configuration(
                format!(
                    "compression level {} is outside 1..=22",
                    self.compression_level
                ),
                RecoveryHint::UseDefault {
                    value: DEFAULT_COMPRESSION_LEVEL.to_string(),
                },
            ));
        }

        if !is_valid_map_size(self.map_size) {
            return Err(Error::configuration(
                format!("map size {} is outside 1..={MAX_MAP_SIZE}", self.map_size),
                RecoveryHint::UseDefault {
                    value: DEFAULT_MAP_SIZE.to_string(),
                },
            ));
        }

        Ok(())
    }

    /// The page size hint, or the default when absent or invalid
    pub fn effective_page_size(&self) -> u32 {
        self.page_size
            .filter(|size| is_valid_page_size(*size))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Options handed to an engine's `open`
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            page_size: self.effective_page_size(),
            compression: CompressionConfig {
                enabled: self.compress,
                level: self.compression_level,
                ..CompressionConfig::default()
            },
            lock_timeout: self.lock_timeout,
            map_size: self.map_size.max(1),
        }
    }
}

/// Builder for creating header cache configurations
pub struct HcacheConfigBuilder {
    config: HcacheConfig,
}

impl HcacheConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HcacheConfig {
                source: ConfigSource::Builder,
                ..HcacheConfig::default()
            },
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: HcacheConfig) -> Self {
        Self { config }
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.config.backend = Some(backend.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.config.page_size = Some(page_size);
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.config.compress = enabled;
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.config.compression_level = level;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    pub fn with_map_size(mut self, map_size: usize) -> Self {
        self.config.map_size = map_size;
        self
    }

    /// Build the configuration
    pub fn build(self) -> HcacheConfig {
        self.config
    }
}

impl Default for HcacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration loader that handles precedence
pub struct HcacheConfigLoader;

impl HcacheConfigLoader {
    /// Load configuration with full precedence handling
    pub fn load() -> Result<HcacheConfig> {
        let config = Self::load_from_file(&XdgPaths::config_file())?;
        Ok(Self::apply_env_with(config, |name| std::env::var(name).ok()))
    }

    /// Defaults overlaid with `path`, if it exists
    pub fn load_from_file(path: &Path) -> Result<HcacheConfig> {
        let config = HcacheConfig::default();

        if !path.exists() {
            log::debug!("No header cache config at {}", path.display());
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            operation: "read config file",
            source: e,
            recovery_hint: RecoveryHint::CheckPermissions {
                path: path.to_path_buf(),
            },
        })?;

        let file_config: Value = serde_json::from_str(&content)?;
        Ok(Self::apply_file_value(config, &file_config, path))
    }

    /// Overlay the `"header_cache"` object of a parsed config file
    fn apply_file_value(mut config: HcacheConfig, file_config: &Value, path: &Path) -> HcacheConfig {
        let Some(section) = file_config.get("header_cache").and_then(Value::as_object) else {
            return config;
        };

        if let Some(backend) = section.get("backend").and_then(Value::as_str) {
            config.backend = Some(backend.to_string());
        }

        if let Some(value) = section.get("page_size") {
            let parsed = match value {
                Value::String(s) => s.trim().parse::<u32>().ok(),
                other => other.as_u64().and_then(|n| u32::try_from(n).ok()),
            };
            match parsed.filter(|size| is_valid_page_size(*size)) {
                Some(size) => config.page_size = Some(size),
                None => log::warn!("Ignoring invalid page_size {value} in {}", path.display()),
            }
        }

        if let Some(compress) = section.get("compress").and_then(Value::as_bool) {
            config.compress = compress;
        }

        if let Some(level) = section.get("compression_level").and_then(Value::as_i64) {
            config.compression_level = level.clamp(1, 22) as i32;
        }

        if let Some(ms) = section.get("lock_timeout_ms").and_then(Value::as_u64) {
            config.lock_timeout = Duration::from_millis(ms);
        }

        if let Some(value) = section.get("map_size") {
            let parsed = value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|size| is_valid_map_size(*size));
            match parsed {
                Some(size) => config.map_size = size,
                None => log::warn!("Ignoring invalid map_size {value} in {}", path.display()),
            }
        }

        config.source = ConfigSource::ConfigFile(path.to_path_buf());
        config
    }

    /// Overlay environment settings read through `lookup`.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env_with<F>(mut config: HcacheConfig, lookup: F) -> HcacheConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut has_env_config = false;

        if let Some(backend) = lookup(ENV_BACKEND) {
            config.backend = Some(backend);
            has_env_config = true;
        }

        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            match raw.trim().parse::<u32>().ok().filter(|s| is_valid_page_size(*s)) {
                Some(size) => {
                    config.page_size = Some(size);
                    has_env_config = true;
                }
                None => log::warn!("Ignoring invalid {ENV_PAGE_SIZE}={raw}"),
            }
        }

        if let Some(raw) = lookup(ENV_COMPRESS) {
            match parse_bool(&raw) {
                Some(compress) => {
                    config.compress = compress;
                    has_env_config = true;
                }
                None => log::warn!("Ignoring invalid {ENV_COMPRESS}={raw}"),
            }
        }

        if let Some(raw) = lookup(ENV_COMPRESSION_LEVEL) {
            match raw.trim().parse::<i32>() {
                Ok(level) if (1..=22).contains(&level) => {
                    config.compression_level = level;
                    has_env_config = true;
                }
                _ => log::warn!("Ignoring invalid {ENV_COMPRESSION_LEVEL}={raw}"),
            }
        }

        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => {
                    config.lock_timeout = Duration::from_millis(ms);
                    has_env_config = true;
                }
                Err(_) => log::warn!("Ignoring invalid {ENV_LOCK_TIMEOUT_MS}={raw}"),
            }
        }

        if let Some(raw) = lookup(ENV_MAP_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(size) if is_valid_map_size(size) => {
                    config.map_size = size;
                    has_env_config = true;
                }
                _ => log::warn!("Ignoring invalid {ENV_MAP_SIZE}={raw}"),
            }
        }

        if has_env_config {
            config.source = ConfigSource::Environment;
        }
        config
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HcacheConfig::default();
        assert_eq!(config.backend, None);
        assert_eq!(config.effective_page_size(), 16384);
        assert!(!config.compress);
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = HcacheConfigBuilder::new()
            .with_backend("sqlite")
            .with_page_size(4096)
            .with_compression(true)
            .with_compression_level(9)
            .with_lock_timeout(Duration::from_millis(250))
            .build();

        assert_eq!(config.backend.as_deref(), Some("sqlite"));
        assert_eq!(config.source, ConfigSource::Builder);

        let options = config.backend_options();
        assert_eq!(options.page_size, 4096);
        assert!(options.compression.enabled);
        assert_eq!(options.compression.level, 9);
        assert_eq!(options.lock_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_validation() {
        let config = HcacheConfigBuilder::new().with_backend("zzz").build();
        assert!(config.validate().unwrap_err().is_configuration());

        let config = HcacheConfigBuilder::new().with_page_size(1000).build();
        assert!(config.validate().is_err());
        assert_eq!(config.effective_page_size(), DEFAULT_PAGE_SIZE);

        let config = HcacheConfigBuilder::new().with_page_size(0).build();
        assert_eq!(config.effective_page_size(), DEFAULT_PAGE_SIZE);

        let config = HcacheConfigBuilder::new().with_compression_level(40).build();
        assert!(config.validate().is_err());

        let config = HcacheConfigBuilder::new().with_backend("").build();
        assert!(config.validate().is_ok());

        let config = HcacheConfigBuilder::new().with_map_size(usize::MAX).build();
        assert!(config.validate().unwrap_err().is_configuration());

        let config = HcacheConfigBuilder::new().with_map_size(MAX_MAP_SIZE).build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_loading() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_file = temp_dir.path().join("config.json");
        std::fs::write(
            &config_file,
            r#"{
                "header_cache": {
                    "backend": "redb",
                    "page_size": "8192",
                    "compress": true,
                    "compression_level": 7,
                    "lock_timeout_ms": 1500,
                    "map_size": 1048576
                },
                "unrelated": { "ignored": true }
            }"#,
        )?;

        let config = HcacheConfigLoader::load_from_file(&config_file)?;
        assert_eq!(config.backend.as_deref(), Some("redb"));
        assert_eq!(config.page_size, Some(8192));
        assert!(config.compress);
        assert_eq!(config.compression_level, 7);
        assert_eq!(config.lock_timeout, Duration::from_millis(1500));
        assert_eq!(config.map_size, 1024 * 1024);
        assert_eq!(config.source, ConfigSource::ConfigFile(config_file));

        Ok(())
    }

    #[test]
    fn test_config_file_edge_cases() -> Result<()> {
        let temp_dir = TempDir::new()?;

        // Missing file means defaults
        let config = HcacheConfigLoader::load_from_file(&temp_dir.path().join("absent.json"))?;
        assert_eq!(config, HcacheConfig::default());

        // Invalid page size is dropped
        let config_file = temp_dir.path().join("config.json");
        std::fs::write(&config_file, r#"{"header_cache": {"page_size": 3}}"#)?;
        let config = HcacheConfigLoader::load_from_file(&config_file)?;
        assert_eq!(config.page_size, None);

        // Out-of-range map size keeps the default
        std::fs::write(
            &config_file,
            r#"{"header_cache": {"map_size": 18446744073709551615}}"#,
        )?;
        let config = HcacheConfigLoader::load_from_file(&config_file)?;
        assert_eq!(config.map_size, DEFAULT_MAP_SIZE);
        assert!(config.validate().is_ok());

        // Broken JSON is a configuration error
        std::fs::write(&config_file, "{ not json")?;
        let err = HcacheConfigLoader::load_from_file(&config_file).unwrap_err();
        assert!(err.is_configuration());

        Ok(())
    }

    #[test]
    fn test_env_overrides_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_file = temp_dir.path().join("config.json");
        std::fs::write(
            &config_file,
            r#"{"header_cache": {"backend": "redb", "compress": true}}"#,
        )?;

        let config = HcacheConfigLoader::load_from_file(&config_file)?;
        let config = HcacheConfigLoader::apply_env_with(
            config,
            env_of(&[(ENV_BACKEND, "sqlite"), (ENV_PAGE_SIZE, "4096")]),
        );

        assert_eq!(config.backend.as_deref(), Some("sqlite"));
        assert_eq!(config.page_size, Some(4096));
        assert!(config.compress);
        assert_eq!(config.source, ConfigSource::Environment);

        Ok(())
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let config = HcacheConfigLoader::apply_env_with(
            HcacheConfig::default(),
            env_of(&[
                (ENV_PAGE_SIZE, "lots"),
                (ENV_COMPRESS, "maybe"),
                (ENV_COMPRESSION_LEVEL, "99"),
                (ENV_LOCK_TIMEOUT_MS, "-1"),
                (ENV_MAP_SIZE, "0"),
            ]),
        );
        assert_eq!(config, HcacheConfig::default());

        let huge = usize::MAX.to_string();
        let config = HcacheConfigLoader::apply_env_with(
            HcacheConfig::default(),
            env_of(&[(ENV_MAP_SIZE, huge.as_str())]),
        );

        assert_eq!(config, HcacheConfig::default());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    #[serial]
    fn test_load_reads_process_environment() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let original_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        let original_compress = std::env::var(ENV_COMPRESS).ok();

        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
        std::env::set_var(ENV_COMPRESS, "true");

        let config = HcacheConfigLoader::load();

        match original_xdg {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
        match original_compress {
            Some(value) => std::env::set_var(ENV_COMPRESS, value),
            None => std::env::remove_var(ENV_COMPRESS),
        }

        let config = config?;
        assert!(config.compress);
        assert_eq!(config.source, ConfigSource::Environment);
        Ok(())
    }
}
