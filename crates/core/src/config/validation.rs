//! Configuration validation rules.
//!
//! This module provides validation logic for `CacheConfig` values
//! after they have been loaded from environment, files, or defaults.

use thiserror::Error;

use crate::cache::lock::WriteLockKind;
use crate::config::CacheConfig;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `cache_location` or `namespace` is
    /// empty, and `ConfigError::Invalid` if:
    /// - an ignored scheme is empty or contains characters no URL scheme has
    /// - an ignored status code is outside 100..=599
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_location.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_location".into(),
                hint: "Set CRAWLCACHE_CACHE_LOCATION environment variable".into(),
            });
        }

        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "namespace".into(),
                hint: "Set CRAWLCACHE_NAMESPACE environment variable".into(),
            });
        }

        for scheme in &self.ignored_schemes {
            let valid = scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if !valid {
                return Err(ConfigError::Invalid {
                    field: "ignored_schemes".into(),
                    reason: format!("{scheme:?} is not a URL scheme"),
                });
            }
        }

        if let Some(code) = self.ignored_status_codes.iter().find(|c| !(100..=599).contains(*c)) {
            return Err(ConfigError::Invalid {
                field: "ignored_status_codes".into(),
                reason: format!("{code} is not an HTTP status code"),
            });
        }

        if self.write_lock != WriteLockKind::File && self.write_lock_path.is_some() {
            tracing::warn!(
                write_lock = ?self.write_lock,
                "write_lock_path is set but write_lock is not \"file\"; \
                 the path is ignored"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_location() {
        let config = CacheConfig { cache_location: PathBuf::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "cache_location"));
    }

    #[test]
    fn test_validate_blank_namespace() {
        let config = CacheConfig { namespace: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "namespace"));
    }

    #[test]
    fn test_validate_bad_scheme() {
        for scheme in ["", "1http", "ht tp", "ftp:"] {
            let config = CacheConfig { ignored_schemes: vec![scheme.into()], ..Default::default() };
            let result = config.validate();
            assert!(
                matches!(result, Err(ConfigError::Invalid { ref field, .. }) if field == "ignored_schemes"),
                "accepted {scheme:?}"
            );
        }
    }

    #[test]
    fn test_validate_good_schemes() {
        let config = CacheConfig {
            ignored_schemes: vec!["ftp".into(), "FILE".into(), "svn+ssh".into(), "data".into()],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_status_code_range() {
        let config = CacheConfig { ignored_status_codes: vec![500, 99], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "ignored_status_codes"));

        let config = CacheConfig { ignored_status_codes: vec![600], ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = CacheConfig { ignored_status_codes: vec![100, 599], ..Default::default() }; // bounds inclusive
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_stray_lock_path_is_only_a_warning() {
        let config = CacheConfig { write_lock_path: Some(PathBuf::from("/tmp/x.lock")), ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
