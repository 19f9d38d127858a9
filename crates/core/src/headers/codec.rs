//! Storable text form of a `HeaderCollection`.
//!
//! The blob is a JSON object:
//!
//! ```json
//! {"encoding": "utf-8", "rep": {"Content-Type": "text/html", "Set-Cookie": ["a=1", "b=2"]}}
//! ```
//!
//! A header with exactly one value is written as a string, any other count
//! as a list. `rep` keeps the collection's name order.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{HeaderCollection, HeaderEncoding, HeaderError};

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredValue {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredHeaders {
    encoding: String,
    rep: OrderedRep,
}

/// Header entries in collection order. A plain `HashMap` would lose it.
#[derive(Debug, Default)]
struct OrderedRep(Vec<(String, StoredValue)>);

impl Serialize for OrderedRep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OrderedRep {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RepVisitor;

        impl<'de> Visitor<'de> for RepVisitor {
            type Value = OrderedRep;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to a string or a list of strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, StoredValue>()? {
                    entries.push((name, value));
                }
                Ok(OrderedRep(entries))
            }
        }

        deserializer.deserialize_map(RepVisitor)
    }
}

/// Encode a header collection into its storable text form.
///
/// # Errors
///
/// Returns `HeaderError::Encoding` if a name or value cannot be represented
/// in the collection's declared encoding.
pub fn encode(headers: &HeaderCollection) -> Result<String, HeaderError> {
    let encoding = headers.encoding();
    let mut rep = OrderedRep::default();

    for (name, values) in headers.iter() {
        let not_representable = || HeaderError::Encoding { name: name.to_string(), encoding };

        if encoding.encode_str(name).is_none() {
            return Err(not_representable());
        }

        let mut texts = values
            .iter()
            .map(|v| encoding.decode_bytes(v).ok_or_else(not_representable))
            .collect::<Result<Vec<_>, _>>()?;

        let stored = if texts.len() == 1 { StoredValue::One(texts.remove(0)) } else { StoredValue::Many(texts) };
        rep.0.push((name.to_string(), stored));
    }

    let stored = StoredHeaders { encoding: encoding.label().to_string(), rep };
    serde_json::to_string(&stored).map_err(|e| HeaderError::Decode(format!("serialization failed: {e}")))
}

/// Decode a blob produced by [`encode`].
///
/// # Errors
///
/// Returns `HeaderError::Decode` if the blob is not valid JSON of the
/// expected shape, names an unsupported encoding, repeats a header name,
/// or holds text that cannot be converted back with the declared encoding.
pub fn decode(blob: &str) -> Result<HeaderCollection, HeaderError> {
    let stored: StoredHeaders = serde_json::from_str(blob).map_err(|e| HeaderError::Decode(e.to_string()))?;
    let encoding: HeaderEncoding = stored.encoding.parse()?;

    let mut headers = HeaderCollection::with_encoding(encoding);
    for (name, value) in stored.rep.0 {
        if encoding.encode_str(&name).is_none() {
            return Err(HeaderError::Decode(format!("header name {name:?} is not valid {encoding}")));
        }
        if headers.contains(&name) {
            return Err(HeaderError::Decode(format!("duplicate header {name:?}")));
        }

        let texts = match value {
            StoredValue::One(text) => vec![text],
            StoredValue::Many(texts) => texts,
        };
        let values = texts
            .iter()
            .map(|t| {
                encoding
                    .encode_str(t)
                    .ok_or_else(|| HeaderError::Decode(format!("value of {name:?} is not valid {encoding}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        headers.set_all(name, values);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HeaderCollection {
        let mut headers = HeaderCollection::new();
        headers.insert("Content-Type", "text/html");
        headers.append("Set-Cookie", "a=1");
        headers.append("Set-Cookie", "b=2");
        headers.insert("Date", "Sun, 06 Nov 1994 08:49:37 GMT");
        headers
    }

    #[test]
    fn test_round_trip_preserves_order_and_values() {
        let headers = sample();
        let decoded = decode(&encode(&headers).unwrap()).unwrap();
        assert_eq!(decoded, headers);
        let names: Vec<_> = decoded.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["Content-Type", "Set-Cookie", "Date"]);
    }

    #[test]
    fn test_blob_shape() {
        let blob = encode(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(value["encoding"], "utf-8");
        assert_eq!(value["rep"]["Content-Type"], "text/html");
        assert_eq!(value["rep"]["Set-Cookie"], serde_json::json!(["a=1", "b=2"]));
    }

    #[test]
    fn test_empty_collection_round_trips() {
        let headers = HeaderCollection::with_encoding(HeaderEncoding::Ascii);
        let decoded = decode(&encode(&headers).unwrap()).unwrap();
        assert_eq!(decoded, headers);
        assert_eq!(decoded.encoding(), HeaderEncoding::Ascii);
    }

    #[test]
    fn test_header_without_values_round_trips() {
        let mut headers = HeaderCollection::new();
        headers.set_all("X-Empty", Vec::new());
        headers.insert("X-Blank", "");
        assert_eq!(decode(&encode(&headers).unwrap()).unwrap(), headers);
    }

    #[test]
    fn test_latin1_bytes_round_trip_exactly() {
        let mut headers = HeaderCollection::with_encoding(HeaderEncoding::Latin1);
        headers.insert("Content-Disposition", b"attachment; filename=\xE9t\xE9.txt".to_vec());
        headers.insert("X-Raw", vec![0x80, 0xFF, 0x00]);
        let decoded = decode(&encode(&headers).unwrap()).unwrap();
        assert_eq!(decoded.get("X-Raw"), Some(&[0x80, 0xFF, 0x00][..]));
        assert_eq!(decoded, headers);
    }

    #[test]
    fn test_invalid_utf8_value_is_encoding_error() {
        let mut headers = HeaderCollection::new();
        headers.insert("X-Binary", vec![0xC3, 0x28]);
        let err = encode(&headers).unwrap_err();
        assert!(matches!(err, HeaderError::Encoding { name, encoding: HeaderEncoding::Utf8 } if name == "X-Binary"));
    }

    #[test]
    fn test_non_ascii_name_is_encoding_error() {
        let mut headers = HeaderCollection::with_encoding(HeaderEncoding::Ascii);
        headers.insert("X-Caf\u{e9}", "ok");
        assert!(matches!(encode(&headers), Err(HeaderError::Encoding { .. })));
    }

    #[test]
    fn test_decode_rejects_malformed_blobs() {
        for blob in [
            "",
            "not json",
            "[]",
            r#"{"rep": {}}"#,
            r#"{"encoding": "utf-8"}"#,
            r#"{"encoding": "utf-8", "rep": {"A": 1}}"#,
            r#"{"encoding": "utf-8", "rep": {"A": ["x", 2]}}"#,
            r#"{"encoding": "utf-8", "rep": {}, "extra": true}"#,
            r#"{"encoding": "ebcdic", "rep": {}}"#,
        ] {
            assert!(matches!(decode(blob), Err(HeaderError::Decode(_))), "accepted {blob:?}");
        }
    }

    #[test]
    fn test_decode_rejects_duplicate_names() {
        let blob = r#"{"encoding": "utf-8", "rep": {"Server": "a", "server": "b"}}"#;
        assert!(matches!(decode(blob), Err(HeaderError::Decode(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn test_decode_rejects_text_outside_encoding() {
        let blob = r#"{"encoding": "ascii", "rep": {"X-Name": "café"}}"#;
        assert!(matches!(decode(blob), Err(HeaderError::Decode(_))));
    }
}
