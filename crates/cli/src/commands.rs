//! Command handlers. Each returns a serializable report; `main` prints it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crawlcache_core::cache::freshness_threshold;
use crawlcache_core::fingerprint::to_hex;
use crawlcache_core::{CacheConfig, CacheEntry, CacheKey, Error, Fingerprinter, HttpCacheStore, NamespaceStats};
use crawlcache_core::{Request, Sha256Fingerprinter};

#[derive(Debug, Serialize)]
pub struct InitReport {
    pub location: PathBuf,
    pub namespace: String,
    pub entries: u64,
}

/// A cached entry rendered for humans and scripts.
#[derive(Debug, Serialize)]
pub struct EntryView {
    pub fingerprint: String,
    pub namespace: String,
    pub status: u16,
    pub url: String,
    pub encoding: String,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body_len: usize,
    pub seen_at: DateTime<Utc>,
}

impl From<CacheEntry> for EntryView {
    fn from(entry: CacheEntry) -> Self {
        let encoding = entry.headers.encoding();
        let headers = entry
            .headers
            .iter()
            .map(|(name, values)| {
                let values = values
                    .iter()
                    .map(|v| encoding.decode_bytes(v).unwrap_or_else(|| String::from_utf8_lossy(v).into_owned()))
                    .collect();
                (name.to_string(), values)
            })
            .collect();

        Self {
            fingerprint: entry.key.fingerprint_hex(),
            namespace: entry.key.namespace,
            status: entry.status,
            url: entry.url,
            encoding: encoding.label().to_string(),
            headers,
            body_len: entry.body.len(),
            seen_at: entry.seen_at,
        }
    }
}

#[derive(Debug)]
pub enum GetOutcome {
    Hit(Box<EntryView>),
    Miss,
    Corrupt(String),
}

impl GetOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Hit(_) => 0,
            Self::Miss => 1,
            Self::Corrupt(_) => 2,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FingerprintReport {
    pub method: String,
    pub url: String,
    pub fingerprint: String,
}

pub fn init(store: &HttpCacheStore, config: &CacheConfig) -> Result<InitReport> {
    Ok(InitReport {
        location: store.location().map_or_else(|| config.cache_location.clone(), PathBuf::from),
        namespace: config.namespace.clone(),
        entries: store.entry_count(&config.namespace)?,
    })
}

/// Look up one entry. `max_age = None` falls back to the configured default;
/// `Some(0)` accepts any age, like the configured default of zero.
pub fn get(
    store: &HttpCacheStore, config: &CacheConfig, namespace: Option<String>, fingerprint: &str, max_age: Option<u64>,
) -> Result<GetOutcome> {
    let fingerprint =
        hex::decode(fingerprint.trim()).with_context(|| format!("fingerprint {fingerprint:?} is not hex"))?;
    let key = CacheKey::new(fingerprint, namespace.unwrap_or_else(|| config.namespace.clone()));

    let threshold = match max_age {
        Some(secs) => freshness_threshold((secs > 0).then(|| Duration::from_secs(secs)), Utc::now()),
        None => config.retrieve_threshold(Utc::now()),
    };

    match store.retrieve(&key, threshold) {
        Ok(Some(entry)) => Ok(GetOutcome::Hit(Box::new(entry.into()))),
        Ok(None) => Ok(GetOutcome::Miss),
        Err(e @ Error::CorruptEntry { .. }) => Ok(GetOutcome::Corrupt(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

pub fn stats(store: &HttpCacheStore) -> Result<Vec<NamespaceStats>> {
    Ok(store.stats()?)
}

pub fn fingerprint(method: &str, include_headers: &[String], headers: &[String], url: &str) -> Result<FingerprintReport> {
    let url = Url::parse(url).with_context(|| format!("invalid URL {url:?}"))?;
    let mut request = Request::get(url).with_method(method);
    for header in headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("header {header:?} is not NAME:VALUE");
        };
        request = request.with_header(name.trim(), value.trim());
    }

    let fingerprinter = Sha256Fingerprinter::new().with_headers(include_headers.iter().cloned());
    Ok(FingerprintReport {
        method: request.method.to_ascii_uppercase(),
        url: request.url.to_string(),
        fingerprint: to_hex(&fingerprinter.fingerprint(&request)),
    })
}
