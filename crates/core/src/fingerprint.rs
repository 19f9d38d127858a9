//! Request fingerprints used as the cache lookup key.
//!
//! The store never computes fingerprints itself; it is handed the output of
//! a [`Fingerprinter`]. [`Sha256Fingerprinter`] is the stock implementation.

use sha2::{Digest, Sha256};
use url::Url;

use crate::http::Request;

/// Version byte mixed into every [`Sha256Fingerprinter`] digest. Bump it when
/// the canonical form changes so old rows stop matching.
pub const FINGERPRINT_VERSION: u8 = 1;

/// Deterministic request identity, stable for the lifetime of one cache file.
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, request: &Request) -> Vec<u8>;
}

impl<F> Fingerprinter for F
where
    F: Fn(&Request) -> Vec<u8> + Send + Sync,
{
    fn fingerprint(&self, request: &Request) -> Vec<u8> {
        self(request)
    }
}

/// SHA-256 over the method, canonical URL, selected headers and body.
#[derive(Debug, Clone, Default)]
pub struct Sha256Fingerprinter {
    include_headers: Vec<String>,
}

impl Sha256Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also hash the values of these headers. Names are matched
    /// case-insensitively; their order here does not matter.
    pub fn with_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_headers = names.into_iter().map(|n| n.into().to_ascii_lowercase()).collect();
        self.include_headers.sort();
        self.include_headers.dedup();
        self
    }
}

impl Fingerprinter for Sha256Fingerprinter {
    fn fingerprint(&self, request: &Request) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update([FINGERPRINT_VERSION]);
        hasher.update(request.method.to_ascii_uppercase().as_bytes());
        hasher.update(b"\n");
        hasher.update(canonical_url(&request.url).as_bytes());
        hasher.update(b"\n");
        for name in &self.include_headers {
            hasher.update(name.as_bytes());
            hasher.update(b":");
            for value in request.headers.get_all(name) {
                hasher.update((value.len() as u64).to_be_bytes());
                hasher.update(value);
            }
            hasher.update(b"\n");
        }
        hasher.update(&request.body);
        hasher.finalize().to_vec()
    }
}

/// Canonical URL form: fragment dropped, query pairs sorted.
///
/// Scheme and host are already lower-cased by the URL parser.
pub fn canonical_url(url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);

    if canonical.query().is_some() {
        let mut pairs: Vec<(String, String)> =
            canonical.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        if pairs.is_empty() {
            canonical.set_query(None);
        } else {
            pairs.sort();
            canonical.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    canonical.to_string()
}

/// Lower-case hex rendering used in logs and errors.
pub fn to_hex(fingerprint: &[u8]) -> String {
    hex::encode(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_fingerprint_stability() {
        let fp = Sha256Fingerprinter::new();
        assert_eq!(fp.fingerprint(&get("https://example.com/a")), fp.fingerprint(&get("https://example.com/a")));
        assert_eq!(fp.fingerprint(&get("https://example.com/a")).len(), 32);
    }

    #[test]
    fn test_fingerprint_ignores_fragment_and_query_order() {
        let fp = Sha256Fingerprinter::new();
        let a = fp.fingerprint(&get("https://EXAMPLE.com/p?b=2&a=1#top"));
        let b = fp.fingerprint(&get("https://example.com/p?a=1&b=2"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_different_method_and_body() {
        let fp = Sha256Fingerprinter::new();
        let plain = fp.fingerprint(&get("https://example.com/form"));
        let post = fp.fingerprint(&get("https://example.com/form").with_method("POST"));
        let post_body = fp.fingerprint(&get("https://example.com/form").with_method("post").with_body("x=1"));
        assert_ne!(plain, post);
        assert_ne!(post, post_body);
        assert_eq!(post, fp.fingerprint(&get("https://example.com/form").with_method("post")));
    }

    #[test]
    fn test_fingerprint_headers_only_when_included() {
        let request = get("https://example.com").with_header("Accept-Language", "de");
        let bare = Sha256Fingerprinter::new();
        assert_eq!(bare.fingerprint(&request), bare.fingerprint(&get("https://example.com")));

        let vary = Sha256Fingerprinter::new().with_headers(["accept-language"]);
        assert_ne!(vary.fingerprint(&request), vary.fingerprint(&get("https://example.com")));
        assert_ne!(
            vary.fingerprint(&request),
            vary.fingerprint(&get("https://example.com").with_header("Accept-Language", "fr"))
        );
    }

    #[test]
    fn test_closure_fingerprinter() {
        let fixed = |_: &Request| b"abc123".to_vec();
        assert_eq!(fixed.fingerprint(&get("https://example.com")), b"abc123");
    }

    #[test]
    fn test_canonical_url_drops_empty_query() {
        assert_eq!(canonical_url(&Url::parse("http://example.com/?").unwrap()), "http://example.com/");
        assert_eq!(to_hex(&[0xab, 0x01]), "ab01");
    }
}
