//! Freshness policy: what to cache and when a cached response may be served.
//!
//! The policy is pure. It holds configuration read once at construction and
//! never touches the store; the crawl middleware composes the two:
//!
//! ```text
//! should_cache_request? ── no ──> network only
//!        │ yes
//!   store.retrieve ── hit + is_fresh ──> serve cached
//!        │ miss / stale
//!   network fetch ── should_cache_response? ── yes ──> store.store
//!        │
//!   serve network
//! ```
//!
//! Freshness is purely age-based. `Cache-Control`, `ETag` and `Vary` are not
//! consulted.

use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::CacheConfig;
use crate::http::{Request, Response};

/// Decides cacheability and staleness for the crawl middleware.
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    ignored_schemes: HashSet<String>,
    ignored_status_codes: HashSet<u16>,
    default_max_age: Option<Duration>,
}

impl CachePolicy {
    /// Build a policy. `default_max_age_seconds = 0` means unbounded: without
    /// a per-request override every cached response is fresh.
    pub fn new<S>(
        ignored_schemes: impl IntoIterator<Item = S>, ignored_status_codes: impl IntoIterator<Item = u16>,
        default_max_age_seconds: u64,
    ) -> Self
    where
        S: AsRef<str>,
    {
        Self {
            ignored_schemes: ignored_schemes.into_iter().map(|s| s.as_ref().to_ascii_lowercase()).collect(),
            ignored_status_codes: ignored_status_codes.into_iter().collect(),
            default_max_age: (default_max_age_seconds > 0).then(|| Duration::from_secs(default_max_age_seconds)),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.ignored_schemes, config.ignored_status_codes.iter().copied(), config.default_max_age_seconds)
    }

    /// False when the request URL scheme is ignored.
    pub fn should_cache_request(&self, request: &Request) -> bool {
        !self.ignored_schemes.contains(request.scheme())
    }

    /// False when the response status is ignored.
    pub fn should_cache_response(&self, response: &Response) -> bool {
        !self.ignored_status_codes.contains(&response.status)
    }

    /// Maximum age allowed for `request`: its own `expire` override if set,
    /// else the default. `None` means unbounded.
    ///
    /// An override is taken literally, so `expire = 0` only accepts a
    /// response dated now or later.
    pub fn max_age_for(&self, request: &Request) -> Option<Duration> {
        request.expire.or(self.default_max_age)
    }

    /// Whether `cached` is young enough to serve for `request`, judged by its
    /// `Date` header.
    pub fn is_fresh(&self, cached: &Response, request: &Request) -> bool {
        self.is_fresh_at(cached, request, Utc::now())
    }

    /// [`is_fresh`](Self::is_fresh) evaluated at `now`.
    ///
    /// A missing or unparsable `Date` header makes a bounded response stale,
    /// so the middleware refetches it.
    pub fn is_fresh_at(&self, cached: &Response, request: &Request, now: DateTime<Utc>) -> bool {
        let Some(max_age) = self.max_age_for(request) else {
            tracing::debug!(url = %cached.url, "no expiry configured; cached response is fresh");
            return true;
        };

        let Some(date) = response_date(cached) else {
            tracing::warn!(
                url = %cached.url,
                date = ?cached.headers.get_str("Date"),
                "cached response has no usable Date header; treating as stale"
            );
            return false;
        };

        let elapsed = now.signed_duration_since(date);
        let allowed = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        let fresh = elapsed <= allowed;

        tracing::debug!(
            elapsed = elapsed.num_seconds(),
            allowed = max_age.as_secs(),
            url = %cached.url,
            "cache response {}",
            if fresh { "fresh enough" } else { "stale" }
        );
        fresh
    }

    /// Always false: a response just fetched from the network is preferred
    /// over the cached one. There is no conditional revalidation.
    pub fn is_valid(&self, _cached: &Response, _fresh: &Response, _request: &Request) -> bool {
        false
    }
}

/// The response `Date` header as a UTC timestamp.
pub fn response_date(response: &Response) -> Option<DateTime<Utc>> {
    let raw = response.headers.get_str("Date")?;
    let parsed: SystemTime = httpdate::parse_http_date(raw.trim()).ok()?;
    Some(DateTime::<Utc>::from(parsed))
}
