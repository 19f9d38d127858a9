//! Cached response CRUD operations.
//!
//! Rows are keyed by `(fingerprint, namespace)`. Writes upsert and always
//! advance `seen_at`; reads filter on `seen_at` and never delete. Stale rows
//! stay in the table until the same key is stored again.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use serde::Serialize;

use super::connection::HttpCacheStore;
use crate::Error;
use crate::fingerprint::{self, Fingerprinter};
use crate::headers::{self, HeaderCollection};
use crate::http::{Request, Response, ResponseReconstructor};

/// Lookup key: an opaque request fingerprint within a logical partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fingerprint: Vec<u8>,
    pub namespace: String,
}

impl CacheKey {
    pub fn new(fingerprint: impl Into<Vec<u8>>, namespace: impl Into<String>) -> Self {
        Self { fingerprint: fingerprint.into(), namespace: namespace.into() }
    }

    /// Key for `request` in `namespace`, using `fingerprinter`.
    pub fn for_request(fingerprinter: &dyn Fingerprinter, request: &Request, namespace: impl Into<String>) -> Self {
        Self::new(fingerprinter.fingerprint(request), namespace)
    }

    pub fn fingerprint_hex(&self) -> String {
        fingerprint::to_hex(&self.fingerprint)
    }
}

/// A cached response as read back from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub status: u16,
    /// Final response URL, which may differ from the request URL.
    pub url: String,
    pub headers: HeaderCollection,
    pub body: Vec<u8>,
    pub seen_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Rebuild the caller's response type from this entry.
    pub fn into_response<R: ResponseReconstructor>(self, reconstructor: &R) -> R::Output {
        reconstructor.from_parts(self.url, self.headers, self.status, self.body)
    }
}

/// Whether a store created the row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted,
    Updated,
}

/// Per-namespace table statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceStats {
    pub namespace: String,
    pub entries: u64,
    pub oldest_seen_at: Option<DateTime<Utc>>,
    pub newest_seen_at: Option<DateTime<Utc>>,
}

/// Oldest `seen_at` a read may return for a given maximum age.
///
/// `None` means unbounded and yields the epoch origin, so nothing is
/// filtered. Otherwise the threshold is `now - max_age`.
pub fn freshness_threshold(max_age: Option<Duration>, now: DateTime<Utc>) -> DateTime<Utc> {
    max_age
        .and_then(|age| TimeDelta::from_std(age).ok())
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

impl HttpCacheStore {
    /// Store a response under `key`, replacing any existing row.
    ///
    /// Runs update-then-insert in one immediate transaction while holding the
    /// write lock, so concurrent stores of one key leave exactly one row with
    /// the payload of whichever writer took the lock last. `seen_at` is set
    /// to the current time, and is always strictly later than the value it
    /// replaces.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the headers cannot be encoded, the lock
    /// cannot be acquired, or the write fails.
    pub fn store(
        &self, key: &CacheKey, status: u16, url: &str, headers: &HeaderCollection, body: &[u8],
    ) -> Result<StoreOutcome, Error> {
        let headers_blob = headers::encode(headers)?;
        let write_failed = |e: rusqlite::Error| Error::Store(e.to_string());

        let _guard = self.write_lock.acquire()?;
        let mut conn = self.connection("store");
        let now = Utc::now().timestamp_micros();

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).map_err(write_failed)?;
        let updated = tx
            .execute(
                "UPDATE httpcache
                SET status = ?1, url = ?2, headers = ?3, body = ?4, seen_at = MAX(?5, seen_at + 1)
                WHERE fingerprint = ?6 AND namespace = ?7",
                params![status, url, headers_blob, body, now, key.fingerprint, key.namespace],
            )
            .map_err(write_failed)?;

        let outcome = if updated == 0 {
            tx.execute(
                "INSERT INTO httpcache (status, url, headers, body, seen_at, fingerprint, namespace)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![status, url, headers_blob, body, now, key.fingerprint, key.namespace],
            )
            .map_err(write_failed)?;
            StoreOutcome::Inserted
        } else {
            StoreOutcome::Updated
        };
        tx.commit().map_err(write_failed)?;

        tracing::debug!(
            fingerprint = %key.fingerprint_hex(),
            namespace = %key.namespace,
            url,
            "{}",
            match outcome {
                StoreOutcome::Inserted => "inserted",
                StoreOutcome::Updated => "updated",
            }
        );
        Ok(outcome)
    }

    /// Store `response` under `key`.
    ///
    /// # Errors
    ///
    /// See [`HttpCacheStore::store`].
    pub fn store_response(&self, key: &CacheKey, response: &Response) -> Result<StoreOutcome, Error> {
        self.store(key, response.status, &response.url, &response.headers, &response.body)
    }

    /// Fetch the entry for `key` if it was stored strictly after `threshold`.
    ///
    /// A missing row and a stale row are both `Ok(None)`. Takes no write lock.
    ///
    /// # Errors
    ///
    /// Returns `Error::CorruptEntry` if a matching row cannot be decoded (the
    /// row is left in place), or `Error::Database` if the query fails.
    pub fn retrieve(&self, key: &CacheKey, threshold: DateTime<Utc>) -> Result<Option<CacheEntry>, Error> {
        let raw = self
            .connection("retrieve")
            .query_row(
                "SELECT status, url, headers, body, seen_at
                FROM httpcache
                WHERE fingerprint = ?1 AND namespace = ?2 AND seen_at > ?3",
                params![key.fingerprint, key.namespace, threshold.timestamp_micros()],
                |row| {
                    Ok(RawRow {
                        status: row.get(0)?,
                        url: row.get(1)?,
                        headers: row.get(2)?,
                        body: row.get(3)?,
                        seen_at: row.get(4)?,
                    })
                },
            )
            .optional()?;

        let Some(raw) = raw else {
            tracing::debug!(fingerprint = %key.fingerprint_hex(), namespace = %key.namespace, "did not find");
            return Ok(None);
        };

        match raw.into_entry(key) {
            Ok(entry) => {
                tracing::debug!(
                    fingerprint = %key.fingerprint_hex(),
                    namespace = %key.namespace,
                    url = %entry.url,
                    "found"
                );
                Ok(Some(entry))
            }
            Err(reason) => {
                tracing::warn!(
                    fingerprint = %key.fingerprint_hex(),
                    namespace = %key.namespace,
                    %reason,
                    "corrupt cache entry"
                );
                Err(Error::CorruptEntry { fingerprint: key.fingerprint_hex(), namespace: key.namespace.clone(), reason })
            }
        }
    }

    /// [`retrieve`](Self::retrieve), rebuilding the response with `reconstructor`.
    ///
    /// # Errors
    ///
    /// See [`HttpCacheStore::retrieve`].
    pub fn retrieve_response<R: ResponseReconstructor>(
        &self, key: &CacheKey, threshold: DateTime<Utc>, reconstructor: &R,
    ) -> Result<Option<R::Output>, Error> {
        Ok(self.retrieve(key, threshold)?.map(|entry| entry.into_response(reconstructor)))
    }

    /// Number of rows in `namespace`, fresh or stale.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the query fails.
    pub fn entry_count(&self, namespace: &str) -> Result<u64, Error> {
        let count: i64 = self.connection("entry_count").query_row(
            "SELECT COUNT(*) FROM httpcache WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Row counts and `seen_at` range for every namespace, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the query fails.
    pub fn stats(&self) -> Result<Vec<NamespaceStats>, Error> {
        let conn = self.connection("stats");
        let mut stmt = conn.prepare(
            "SELECT namespace, COUNT(*), MIN(seen_at), MAX(seen_at)
            FROM httpcache GROUP BY namespace ORDER BY namespace",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, Option<i64>>(3)?,
            ))
        })?;

        let mut stats = Vec::new();
        for row in rows {
            let (namespace, entries, oldest, newest) = row?;
            stats.push(NamespaceStats {
                namespace,
                entries: entries as u64,
                oldest_seen_at: oldest.and_then(DateTime::<Utc>::from_timestamp_micros),
                newest_seen_at: newest.and_then(DateTime::<Utc>::from_timestamp_micros),
            });
        }
        Ok(stats)
    }
}

/// Column values as stored, before any type checks.
struct RawRow {
    status: Value,
    url: Value,
    headers: Value,
    body: Value,
    seen_at: Value,
}

impl RawRow {
    fn into_entry(self, key: &CacheKey) -> Result<CacheEntry, String> {
        let status = match self.status {
            Value::Integer(code) => u16::try_from(code).map_err(|_| format!("status {code} out of range"))?,
            other => return Err(format!("status is {}", type_name(&other))),
        };

        let url = match self.url {
            Value::Text(url) => url,
            other => return Err(format!("url is {}", type_name(&other))),
        };

        let headers_text = match self.headers {
            Value::Text(text) => text,
            Value::Blob(bytes) => String::from_utf8(bytes).map_err(|e| format!("headers: {e}"))?,
            other => return Err(format!("headers is {}", type_name(&other))),
        };
        let headers = headers::decode(&headers_text).map_err(|e| e.to_string())?;

        let body = match self.body {
            Value::Blob(bytes) => bytes,
            Value::Text(text) => text.into_bytes(),
            other => return Err(format!("body is {}", type_name(&other))),
        };

        let seen_at = match self.seen_at {
            Value::Integer(micros) => {
                DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| format!("seen_at {micros} out of range"))?
            }
            other => return Err(format!("seen_at is {}", type_name(&other))),
        };

        Ok(CacheEntry { key: key.clone(), status, url, headers, body, seen_at })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Text(_) => "text",
        Value::Blob(_) => "blob",
    }
}
