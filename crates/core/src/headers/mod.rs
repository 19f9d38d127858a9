//! Ordered, multi-valued header collections.
//!
//! Header values are byte strings. Every collection carries the text
//! encoding used to turn those bytes into storable text and back, so the
//! codec can round-trip values byte-for-byte.

pub mod codec;

use std::fmt;
use std::str::FromStr;

pub use codec::{decode, encode};

/// Header codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// A header name or value is not representable in the declared encoding.
    #[error("header {name:?} is not representable in {encoding}")]
    Encoding { name: String, encoding: HeaderEncoding },

    /// The stored blob is malformed.
    #[error("malformed header blob: {0}")]
    Decode(String),
}

/// Text encoding associated with a header collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeaderEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
    Ascii,
}

impl HeaderEncoding {
    /// Canonical label written into encoded blobs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
            Self::Ascii => "ascii",
        }
    }

    /// Convert raw bytes to text. Returns `None` if the bytes are not valid
    /// in this encoding.
    pub fn decode_bytes(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            Self::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Ascii => bytes.is_ascii().then(|| bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    /// Convert text back to raw bytes. Returns `None` if a character has no
    /// representation in this encoding.
    pub fn encode_str(self, text: &str) -> Option<Vec<u8>> {
        match self {
            Self::Utf8 => Some(text.as_bytes().to_vec()),
            Self::Latin1 => text.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect(),
            Self::Ascii => text.is_ascii().then(|| text.as_bytes().to_vec()),
        }
    }
}

impl fmt::Display for HeaderEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for HeaderEncoding {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Ok(Self::Latin1),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            other => Err(HeaderError::Decode(format!("unsupported encoding {other:?}"))),
        }
    }
}

/// An ordered mapping from header name to one or more byte-string values.
///
/// Names keep the casing they were first inserted with and compare
/// ASCII case-insensitively. Insertion order of names and of values under
/// a name is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderCollection {
    encoding: HeaderEncoding,
    entries: Vec<(String, Vec<Vec<u8>>)>,
}

impl HeaderCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoding(encoding: HeaderEncoding) -> Self {
        Self { encoding, entries: Vec::new() }
    }

    pub fn encoding(&self) -> HeaderEncoding {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace all values stored under `name` with a single value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.set_all(name, vec![value.into()]);
    }

    /// Replace all values stored under `name`.
    pub fn set_all(&mut self, name: impl Into<String>, values: Vec<Vec<u8>>) {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1 = values,
            None => self.entries.push((name, values)),
        }
    }

    /// Add a value under `name`, after any existing values.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.get_all(name).first().map(Vec::as_slice)
    }

    /// First value under `name`, converted to text with the collection's encoding.
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|v| self.encoding.decode_bytes(v))
    }

    pub fn get_all(&self, name: &str) -> &[Vec<u8>] {
        self.position(name).map(|idx| self.entries[idx].1.as_slice()).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<Vec<u8>>> {
        self.position(name).map(|idx| self.entries.remove(idx).1)
    }

    /// Iterate `(name, values)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vec<u8>])> {
        self.entries.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl<N, V> FromIterator<(N, V)> for HeaderCollection
where
    N: Into<String>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = HeaderCollection::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}
