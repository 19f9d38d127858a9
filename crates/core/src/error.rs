//! Unified error types for crawlcache.
//!
//! A cache miss is not an error: `HttpCacheStore::retrieve` reports it as
//! `Ok(None)`. Everything here is a real failure with a defined fallback
//! for the caller (skip caching, fetch from the network, or abort startup).

use std::path::PathBuf;

use crate::cache::lock::LockError;
use crate::headers::HeaderError;

/// Unified error type for the cache store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing location could not be opened or prepared.
    #[error("OPEN_FAILED: {}: {reason}", location.display())]
    Open { location: PathBuf, reason: String },

    /// A write did not reach the table; the response is simply not cached.
    #[error("STORE_FAILED: {0}")]
    Store(String),

    /// A matching row exists but cannot be turned back into a response.
    #[error("CORRUPT_ENTRY: ({fingerprint}, {namespace}): {reason}")]
    CorruptEntry { fingerprint: String, namespace: String, reason: String },

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    pub(crate) fn open(location: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Open { location: location.into(), reason: reason.to_string() }
    }

    /// True when the caller should fall back to a network fetch without
    /// overwriting the stored row.
    pub fn is_corrupt_entry(&self) -> bool {
        matches!(self, Error::CorruptEntry { .. })
    }
}

impl From<LockError> for Error {
    fn from(err: LockError) -> Self {
        Error::Store(format!("write lock: {err}"))
    }
}

impl From<HeaderError> for Error {
    fn from(err: HeaderError) -> Self {
        Error::Store(format!("headers: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CorruptEntry {
            fingerprint: "abc123".to_string(),
            namespace: "spiderA".to_string(),
            reason: "bad headers".to_string(),
        };
        assert!(err.to_string().contains("CORRUPT_ENTRY"));
        assert!(err.to_string().contains("abc123"));
        assert!(err.to_string().contains("spiderA"));
    }

    #[test]
    fn test_lock_error_maps_to_store() {
        let err: Error = LockError::Acquire("busy".to_string()).into();
        assert!(matches!(err, Error::Store(msg) if msg.contains("busy")));
    }

    #[test]
    fn test_is_corrupt_entry() {
        let corrupt =
            Error::CorruptEntry { fingerprint: "00".into(), namespace: "ns".into(), reason: "x".into() };
        assert!(corrupt.is_corrupt_entry());
        assert!(!Error::Store("disk full".into()).is_corrupt_entry());
    }
}
