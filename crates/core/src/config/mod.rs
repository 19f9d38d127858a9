//! Cache configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CRAWLCACHE_*)
//! 2. TOML config file (if CRAWLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::entries::freshness_threshold;
use crate::cache::lock::{FileLock, NoLock, ProcessLock, WriteLock, WriteLockKind};

mod validation;

pub use validation::ConfigError;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_FILE_ENV: &str = "CRAWLCACHE_CONFIG_FILE";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CRAWLCACHE_";

/// Cache configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CRAWLCACHE_*)
/// 2. TOML config file (if CRAWLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path to the SQLite cache file.
    ///
    /// Set via CRAWLCACHE_CACHE_LOCATION environment variable.
    #[serde(default = "default_cache_location")]
    pub cache_location: PathBuf,

    /// Maximum age of a usable cached response, in seconds. 0 means unbounded.
    ///
    /// Set via CRAWLCACHE_DEFAULT_MAX_AGE_SECONDS environment variable.
    #[serde(default)]
    pub default_max_age_seconds: u64,

    /// Request URL schemes that are never cached.
    ///
    /// Set via CRAWLCACHE_IGNORED_SCHEMES environment variable (e.g. `["ftp","file"]`).
    #[serde(default = "default_ignored_schemes")]
    pub ignored_schemes: Vec<String>,

    /// Response status codes that are never cached.
    ///
    /// Set via CRAWLCACHE_IGNORED_STATUS_CODES environment variable (e.g. `[500,503]`).
    #[serde(default)]
    pub ignored_status_codes: Vec<u16>,

    /// Write lock used to serialize writers (`none`, `process` or `file`).
    ///
    /// Set via CRAWLCACHE_WRITE_LOCK environment variable.
    #[serde(default)]
    pub write_lock: WriteLockKind,

    /// Lock file for `write_lock = "file"`. Defaults to the cache location
    /// with a `.lock` suffix.
    ///
    /// Set via CRAWLCACHE_WRITE_LOCK_PATH environment variable.
    #[serde(default)]
    pub write_lock_path: Option<PathBuf>,

    /// Logical cache partition, typically the crawl job name.
    ///
    /// Set via CRAWLCACHE_NAMESPACE environment variable.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_cache_location() -> PathBuf {
    PathBuf::from("./httpcache.sqlite3")
}

fn default_ignored_schemes() -> Vec<String> {
    vec!["file".into()]
}

fn default_namespace() -> String {
    "default".into()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_location: default_cache_location(),
            default_max_age_seconds: 0,
            ignored_schemes: default_ignored_schemes(),
            ignored_status_codes: Vec::new(),
            write_lock: WriteLockKind::None,
            write_lock_path: None,
            namespace: default_namespace(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CRAWLCACHE_`
    /// 2. TOML file from `CRAWLCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    /// Like [`load`](Self::load), but with an explicit TOML file instead of
    /// `CRAWLCACHE_CONFIG_FILE`. Environment variables still win.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if loading or validation fails.
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = file {
            if !path.exists() {
                return Err(ConfigError::LoadFailed(format!("config file {} not found", path.display())));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Default maximum age, or `None` when unbounded.
    pub fn default_max_age(&self) -> Option<Duration> {
        (self.default_max_age_seconds > 0).then(|| Duration::from_secs(self.default_max_age_seconds))
    }

    /// Oldest `seen_at` a read may return at `now` under the default maximum age.
    pub fn retrieve_threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        freshness_threshold(self.default_max_age(), now)
    }

    /// Lock file used when `write_lock = "file"`.
    pub fn write_lock_path(&self) -> PathBuf {
        self.write_lock_path.clone().unwrap_or_else(|| {
            let mut path = self.cache_location.clone().into_os_string();
            path.push(".lock");
            PathBuf::from(path)
        })
    }

    /// Build the configured write lock.
    pub fn build_write_lock(&self) -> Arc<dyn WriteLock> {
        match self.write_lock {
            WriteLockKind::None => Arc::new(NoLock),
            WriteLockKind::Process => Arc::new(ProcessLock::new()),
            WriteLockKind::File => Arc::new(FileLock::new(self.write_lock_path())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.cache_location, PathBuf::from("./httpcache.sqlite3"));
        assert_eq!(config.default_max_age_seconds, 0);
        assert_eq!(config.ignored_schemes, vec!["file".to_string()]);
        assert!(config.ignored_status_codes.is_empty());
        assert_eq!(config.write_lock, WriteLockKind::None);
        assert!(config.write_lock_path.is_none());
        assert_eq!(config.namespace, "default");
    }

    #[test]
    fn test_default_max_age() {
        let config = CacheConfig::default();
        assert_eq!(config.default_max_age(), None);

        let config = CacheConfig { default_max_age_seconds: 90, ..Default::default() };
        assert_eq!(config.default_max_age(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_retrieve_threshold() {
        let now = Utc::now();
        assert_eq!(CacheConfig::default().retrieve_threshold(now), DateTime::<Utc>::UNIX_EPOCH);

        let config = CacheConfig { default_max_age_seconds: 60, ..Default::default() };
        assert_eq!(config.retrieve_threshold(now), now - chrono::TimeDelta::seconds(60));
    }

    #[test]
    fn test_write_lock_path() {
        let config = CacheConfig { cache_location: PathBuf::from("/var/cache/job.sqlite3"), ..Default::default() };
        assert_eq!(config.write_lock_path(), PathBuf::from("/var/cache/job.sqlite3.lock"));

        let config = CacheConfig { write_lock_path: Some(PathBuf::from("/run/job.lock")), ..Default::default() };
        assert_eq!(config.write_lock_path(), PathBuf::from("/run/job.lock"));
    }

    #[test]
    fn test_build_write_lock() {
        let config = CacheConfig::default();
        assert!(format!("{:?}", config.build_write_lock()).contains("NoLock"));

        let config = CacheConfig { write_lock: WriteLockKind::Process, ..Default::default() };
        assert!(format!("{:?}", config.build_write_lock()).contains("ProcessLock"));

        let config = CacheConfig { write_lock: WriteLockKind::File, ..Default::default() };
        assert!(format!("{:?}", config.build_write_lock()).contains("httpcache.sqlite3.lock"));
    }

    #[test]
    fn test_load_defaults() {
        Jail::expect_with(|_jail| {
            let config = CacheConfig::load_from(None).unwrap();
            assert_eq!(config, CacheConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_layers_env_over_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "crawlcache.toml",
                r#"
                cache_location = "jobs/cache.sqlite3"
                default_max_age_seconds = 3600
                ignored_schemes = ["ftp", "file"]
                ignored_status_codes = [500, 502, 503]
                write_lock = "file"
                namespace = "from-file"
                "#,
            )?;
            jail.set_env("CRAWLCACHE_NAMESPACE", "spiderA");
            jail.set_env("CRAWLCACHE_DEFAULT_MAX_AGE_SECONDS", "60");

            let config = CacheConfig::load_from(Some(Path::new("crawlcache.toml"))).unwrap();
            assert_eq!(config.cache_location, PathBuf::from("jobs/cache.sqlite3"));
            assert_eq!(config.default_max_age_seconds, 60);
            assert_eq!(config.ignored_schemes, vec!["ftp".to_string(), "file".to_string()]);
            assert_eq!(config.ignored_status_codes, vec![500, 502, 503]);
            assert_eq!(config.write_lock, WriteLockKind::File);
            assert_eq!(config.namespace, "spiderA");
            Ok(())
        });
    }

    #[test]
    fn test_load_reads_config_file_env() {
        Jail::expect_with(|jail| {
            jail.create_file("cache.toml", "ignored_status_codes = [404]")?;
            jail.set_env(CONFIG_FILE_ENV, "cache.toml");

            let config = CacheConfig::load().unwrap();
            assert_eq!(config.ignored_status_codes, vec![404]);
            Ok(())
        });
    }

    #[test]
    fn test_load_missing_file() {
        Jail::expect_with(|_jail| {
            let result = CacheConfig::load_from(Some(Path::new("absent.toml")));
            assert!(matches!(result, Err(ConfigError::LoadFailed(_))));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("CRAWLCACHE_IGNORED_STATUS_CODES", "[42]");
            let result = CacheConfig::load_from(None);
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "ignored_status_codes"));
            Ok(())
        });
    }
}
