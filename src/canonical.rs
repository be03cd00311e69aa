//! Canonical serialization for deterministic hashing and content addressing.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: Struct fields serialize in declaration order
//! - Stable map order: JSON object keys are sorted before hashing
//! - Stable Vec order: Vectors serialize in index order
//!
//! Two digests live here: a fast xxHash64 fingerprint for cache keys and
//! change detection, and a SHA-256 content SAID used as the default address
//! of framework credentials issued outside a TEL.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::xxh64;

/// Derivation code prefixed to every content SAID.
pub const SAID_PREFIX: char = 'E';

/// Length of a content SAID including the prefix.
pub const SAID_LENGTH: usize = 44;

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    let value = serde_json::to_value(value).expect("Canonical serialization failed");
    serde_json::to_vec(&sort_keys(&value)).expect("Canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Deterministic SAID over the canonical form of a credential.
///
/// `E` followed by the first 43 characters of the URL-safe, unpadded base64
/// SHA-256 digest. Identical content always yields the identical SAID.
pub fn content_said(credential: &Value) -> String {
    let digest = Sha256::digest(to_canonical_bytes(credential));
    let encoded = URL_SAFE_NO_PAD.encode(digest);
    let mut said = String::with_capacity(SAID_LENGTH);
    said.push(SAID_PREFIX);
    said.extend(encoded.chars().take(SAID_LENGTH - 1));
    said
}

/// Rebuild a JSON value with object keys in sorted order at every level.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct TestStruct {
        name: String,
        value: i32,
    }

    #[test]
    fn test_determinism() {
        let s = TestStruct {
            name: "test".to_string(),
            value: 42,
        };

        let h1 = canonical_hash(&s);
        let h2 = canonical_hash(&s);
        assert_eq!(h1, h2);
        assert_eq!(canonical_hash_hex(&s).len(), 16);
    }

    #[test]
    fn test_said_shape() {
        let said = content_said(&json!({"a": {"name": "fw"}}));
        assert_eq!(said.len(), SAID_LENGTH);
        assert!(said.starts_with(SAID_PREFIX));
        assert!(said[1..].chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_said_ignores_key_order() {
        let a = json!({"name": "fw", "version": "1.0.0", "nested": {"x": 1, "y": 2}});
        let b = json!({"version": "1.0.0", "nested": {"y": 2, "x": 1}, "name": "fw"});
        assert_eq!(content_said(&a), content_said(&b));
    }

    #[test]
    fn test_said_changes_with_content() {
        let a = json!({"version": "1.0.0"});
        let b = json!({"version": "1.1.0"});
        assert_ne!(content_said(&a), content_said(&b));
    }
}
