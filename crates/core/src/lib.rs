//! Core types and shared functionality for crawlcache.
//!
//! This crate provides:
//! - A persistent HTTP response cache with a SQLite backend
//! - The header codec used to store response headers as text
//! - The freshness policy deciding what to cache and when to serve it
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod headers;
pub mod http;
pub mod policy;

pub use cache::{CacheEntry, CacheKey, HttpCacheStore, NamespaceStats, StoreOutcome, WriteLock, WriteLockKind};
pub use config::{CacheConfig, ConfigError};
pub use error::Error;
pub use fingerprint::{Fingerprinter, Sha256Fingerprinter};
pub use headers::{HeaderCollection, HeaderEncoding, HeaderError};
pub use http::{PlainResponses, Request, Response, ResponseReconstructor};
pub use policy::CachePolicy;
