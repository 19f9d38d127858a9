//! SQLite-backed response cache.
//!
//! This module provides the persistent store for crawled responses:
//!
//! - One row per `(fingerprint, namespace)`, written with update-then-insert
//! - Read-time freshness filtering on `seen_at` (no write-time eviction)
//! - Automatic schema migrations
//! - WAL mode for concurrent readers alongside a single writer
//! - A pluggable write lock for processes sharing one file

pub mod connection;
pub mod entries;
pub mod lock;
pub mod migrations;

pub use crate::Error;

pub use connection::HttpCacheStore;
pub use entries::{CacheEntry, CacheKey, NamespaceStats, StoreOutcome, freshness_threshold};
pub use lock::{FileLock, LockError, NoLock, ProcessLock, WriteGuard, WriteLock, WriteLockKind};
