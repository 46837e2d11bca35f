use std::env;
use std::path::PathBuf;

/// XDG Base Directory paths for hcache
pub struct XdgPaths;

impl XdgPaths {
    /// Get XDG_CONFIG_HOME/hcache or fallback
    pub fn config_dir() -> PathBuf {
        env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|home| home.join(".config"))
                    .unwrap_or_else(|| PathBuf::from(".config"))
            })
            .join("hcache")
    }

    /// Get XDG_CACHE_HOME/hcache or fallback
    pub fn cache_dir() -> PathBuf {
        env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|home| home.join(".cache"))
                    .unwrap_or_else(|| PathBuf::from(".cache"))
            })
            .join("hcache")
    }

    /// Get the configuration file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Default directory holding one header cache per mailbox
    pub fn header_cache_dir() -> PathBuf {
        Self::cache_dir().join("headers")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_var<F: FnOnce()>(name: &str, value: &str, f: F) {
        let original = env::var(name).ok();
        env::set_var(name, value);
        f();
        match original {
            Some(val) => env::set_var(name, val),
            None => env::remove_var(name),
        }
    }

    #[test]
    #[serial]
    fn test_xdg_paths_with_env() {
        with_var("XDG_CONFIG_HOME", "/tmp/config", || {
            assert_eq!(XdgPaths::config_dir(), PathBuf::from("/tmp/config/hcache"));
            assert_eq!(
                XdgPaths::config_file(),
                PathBuf::from("/tmp/config/hcache/config.json")
            );
        });

        with_var("XDG_CACHE_HOME", "/tmp/cache", || {
            assert_eq!(XdgPaths::cache_dir(), PathBuf::from("/tmp/cache/hcache"));
            assert_eq!(
                XdgPaths::header_cache_dir(),
                PathBuf::from("/tmp/cache/hcache/headers")
            );
        });
    }
}
