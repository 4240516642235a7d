//! Canonical call fingerprints for cache keying.
//!
//! A fingerprint is a deterministic function of the normalized target URL
//! plus an order-independent encoding of the payload and transport options,
//! so semantically identical calls always collide on the same cache entry.
//! JSON objects are re-serialized with sorted keys and header pairs are
//! sorted before hashing, closing the key-drift hole that ad hoc
//! fingerprinting of caller arguments would leave open.
//!
//! Fingerprints key persisted cache files and must be stable across
//! processes and restarts, so this uses SHA-256 rather than a per-process
//! hasher.

use sha2::{Digest, Sha256};

/// Compute the fingerprint for a call.
///
/// `headers` participate as transport options: two calls differing only in
/// headers (e.g. authorization) get distinct entries.
pub fn fingerprint(
    url: &str,
    payload: Option<&serde_json::Value>,
    headers: &[(String, String)],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update([0u8]);
    if let Some(payload) = payload {
        hasher.update(canonical_json(payload).as_bytes());
    }
    hasher.update([0u8]);
    let mut sorted: Vec<&(String, String)> = headers.iter().collect();
    sorted.sort();
    for (name, value) in sorted {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Serialize a JSON value with object keys in sorted order, recursively.
fn canonical_json(value: &serde_json::Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_is_deterministic() {
        let payload = json!({"a": 1, "b": [1, 2]});
        let headers = vec![("X-One".to_string(), "1".to_string())];
        let f1 = fingerprint("https://api.example.org/q", Some(&payload), &headers);
        let f2 = fingerprint("https://api.example.org/q", Some(&payload), &headers);
        assert_eq!(f1, f2);
        assert_eq!(f1.len(), 64);
    }

    #[test]
    fn object_key_order_does_not_matter() {
        let a = json!({"x": 1, "y": {"b": 2, "a": 3}});
        let b = json!({"y": {"a": 3, "b": 2}, "x": 1});
        assert_eq!(
            fingerprint("https://u", Some(&a), &[]),
            fingerprint("https://u", Some(&b), &[]),
        );
    }

    #[test]
    fn header_order_does_not_matter() {
        let h1 = vec![
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
        ];
        let h2 = vec![
            ("B".to_string(), "2".to_string()),
            ("A".to_string(), "1".to_string()),
        ];
        assert_eq!(
            fingerprint("https://u", None, &h1),
            fingerprint("https://u", None, &h2),
        );
    }

    #[test]
    fn array_order_does_matter() {
        let a = json!({"items": [1, 2]});
        let b = json!({"items": [2, 1]});
        assert_ne!(
            fingerprint("https://u", Some(&a), &[]),
            fingerprint("https://u", Some(&b), &[]),
        );
    }

    #[test]
    fn differs_on_url_payload_and_headers() {
        let p = json!({"a": 1});
        let base = fingerprint("https://u", Some(&p), &[]);
        assert_ne!(base, fingerprint("https://v", Some(&p), &[]));
        assert_ne!(base, fingerprint("https://u", Some(&json!({"a": 2})), &[]));
        assert_ne!(base, fingerprint("https://u", None, &[]));
        assert_ne!(
            base,
            fingerprint(
                "https://u",
                Some(&p),
                &[("Authorization".to_string(), "Bearer t".to_string())]
            ),
        );
    }

    #[test]
    fn absent_and_empty_payload_are_distinct_from_each_other() {
        // None means "no payload field"; an empty object is still a payload.
        assert_ne!(
            fingerprint("https://u", None, &[]),
            fingerprint("https://u", Some(&json!({})), &[]),
        );
    }
}
