//! Request and response values as seen by the cache.
//!
//! These carry only what the store, the fingerprinter and the freshness
//! policy read. The crawl engine converts its own types at the boundary.

use std::time::Duration;

use url::Url;

use crate::headers::HeaderCollection;

/// An outgoing crawl request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: HeaderCollection,
    pub body: Vec<u8>,
    /// Per-request maximum age, overriding the policy default when set.
    pub expire: Option<Duration>,
}

impl Request {
    /// A body-less GET request.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, headers: HeaderCollection::new(), body: Vec::new(), expire: None }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_expire(mut self, expire: Duration) -> Self {
        self.expire = Some(expire);
        self
    }

    /// Lower-cased URL scheme.
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }
}

/// A response, either fresh from the network or rebuilt from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL, after redirects.
    pub url: String,
    pub status: u16,
    pub headers: HeaderCollection,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self { url: url.into(), status, headers: HeaderCollection::new(), body: Vec::new() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn content_type(&self) -> Option<String> {
        self.headers.get_str("Content-Type")
    }
}

/// Builds the caller's response type from the parts of a cache hit.
pub trait ResponseReconstructor {
    type Output;

    fn from_parts(&self, url: String, headers: HeaderCollection, status: u16, body: Vec<u8>) -> Self::Output;
}

/// Reconstructs plain [`Response`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainResponses;

impl ResponseReconstructor for PlainResponses {
    type Output = Response;

    fn from_parts(&self, url: String, headers: HeaderCollection, status: u16, body: Vec<u8>) -> Response {
        Response { url, status, headers, body }
    }
}
