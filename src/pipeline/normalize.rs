//! Response normalisation: pull a download URL and a byte size out of
//! whatever JSON the webhook returned.
//!
//! Webhook workflows answer in many shapes (a Cloudinary upload result, a
//! bare `{ "url": … }`, an n8n item list, something nested under `data` or
//! `file`). Rather than probing ad hoc, the search is expressed as ordered
//! rule tables evaluated against a [`serde_json::Value`]; the first rule that
//! yields a usable value wins. Adding a shape means adding a row.

use crate::error::ConvertError;
use serde_json::{Map, Value};

/// A field path (one or more keys from the result object) to probe.
pub type FieldPath = &'static [&'static str];

/// URL candidates, highest priority first.
pub const URL_RULES: &[FieldPath] = &[
    &["secure_url"],
    &["url"],
    &["downloadUrl"],
    &["file_url"],
    &["download_url"],
    &["public_url"],
    &["link"],
    &["href"],
    &["data", "url"],
    &["data", "downloadUrl"],
    &["data", "file_url"],
    &["file", "url"],
    &["file", "downloadUrl"],
];

/// Size candidates, highest priority first.
pub const SIZE_RULES: &[FieldPath] = &[&["bytes"], &["size"], &["file_size"]];

/// What the normaliser found. Both fields are independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub url: Option<String>,
    pub size: Option<u64>,
}

/// Unwrap a list response and require an object.
///
/// A non-empty array contributes its first element; anything that is then
/// not an object (a scalar, `null`, an empty array) is rejected.
pub fn result_object(payload: &Value) -> Result<&Map<String, Value>, ConvertError> {
    let candidate = match payload {
        Value::Array(items) if !items.is_empty() => &items[0],
        other => other,
    };
    candidate.as_object().ok_or(ConvertError::InvalidResponseFormat)
}

/// Unwrap `payload` and run both searches.
pub fn normalize_payload(payload: &Value) -> Result<Normalized, ConvertError> {
    result_object(payload).map(extract)
}

/// Run the URL and size searches against an already-unwrapped object.
pub fn extract(object: &Map<String, Value>) -> Normalized {
    Normalized {
        url: first_match(object, URL_RULES, as_url),
        size: first_match(object, SIZE_RULES, as_size),
    }
}

fn first_match<T>(
    object: &Map<String, Value>,
    rules: &[FieldPath],
    accept: fn(&Value) -> Option<T>,
) -> Option<T> {
    rules
        .iter()
        .find_map(|path| lookup(object, *path).and_then(accept))
}

fn lookup<'a>(object: &'a Map<String, Value>, path: FieldPath) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = object.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

fn as_url(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn as_size(value: &Value) -> Option<u64> {
    let n = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 1.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (n > 0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn secure_url_and_bytes() {
        let n = normalize_payload(&json!({"secure_url": "https://x/y.avif", "bytes": 500})).unwrap();
        assert_eq!(n.url.as_deref(), Some("https://x/y.avif"));
        assert_eq!(n.size, Some(500));
    }

    #[test]
    fn list_is_unwrapped() {
        let n = normalize_payload(&json!([{"url": "https://x/y.avif"}, {"url": "https://other"}]))
            .unwrap();
        assert_eq!(n.url.as_deref(), Some("https://x/y.avif"));
        assert_eq!(n.size, None);
    }

    #[test]
    fn nested_under_data() {
        let n = normalize_payload(&json!({"data": {"file_url": "https://x/z.avif"}})).unwrap();
        assert_eq!(n.url.as_deref(), Some("https://x/z.avif"));
    }

    #[test]
    fn nested_under_file() {
        let n = normalize_payload(&json!({"file": {"downloadUrl": "https://x/f.avif"}})).unwrap();
        assert_eq!(n.url.as_deref(), Some("https://x/f.avif"));
    }

    #[test]
    fn empty_object_yields_nothing() {
        assert_eq!(normalize_payload(&json!({})).unwrap(), Normalized::default());
    }

    #[test]
    fn top_level_beats_nested_and_order_is_respected() {
        let n = normalize_payload(&json!({
            "href": "https://x/href",
            "url": "https://x/url",
            "data": {"url": "https://x/data"}
        }))
        .unwrap();
        assert_eq!(n.url.as_deref(), Some("https://x/url"));
    }

    #[test]
    fn empty_strings_and_non_strings_are_skipped() {
        let n = normalize_payload(&json!({
            "secure_url": "",
            "url": 42,
            "downloadUrl": "   ",
            "link": "https://x/link"
        }))
        .unwrap();
        assert_eq!(n.url.as_deref(), Some("https://x/link"));
    }

    #[test]
    fn size_priority_and_coercion() {
        assert_eq!(
            normalize_payload(&json!({"size": 20, "bytes": 10})).unwrap().size,
            Some(10)
        );
        assert_eq!(
            normalize_payload(&json!({"bytes": 0, "file_size": "77"})).unwrap().size,
            Some(77)
        );
        assert_eq!(
            normalize_payload(&json!({"size": 12.9})).unwrap().size,
            Some(12)
        );
        assert_eq!(normalize_payload(&json!({"size": -3})).unwrap().size, None);
    }

    #[test]
    fn non_objects_are_rejected() {
        for payload in [json!("ok"), json!(12), json!(null), json!([]), json!(["x"])] {
            let err = normalize_payload(&payload).unwrap_err();
            assert!(
                matches!(err, ConvertError::InvalidResponseFormat),
                "{payload}"
            );
        }
    }
}
