//! Identity types for fincache documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::{FincacheError, FincacheResult, ValidationError};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash for deduplication and integrity verification.
pub type ContentHash = [u8; 32];

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Hash a JSON payload using its canonical serialization.
///
/// `serde_json` keeps object keys sorted (no `preserve_order`), so two
/// structurally equal payloads always hash to the same value.
pub fn payload_hash(payload: &serde_json::Value) -> ContentHash {
    compute_content_hash(payload.to_string().as_bytes())
}

/// Identifier of the company/instrument a document describes.
///
/// Keys are trimmed and upper-cased on construction so `"reliance.ns"` and
/// `"RELIANCE.NS "` address the same cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectKey(String);

impl SubjectKey {
    /// Build a normalized subject key. Blank input is rejected.
    pub fn new(raw: impl AsRef<str>) -> FincacheResult<Self> {
        let normalized = raw.as_ref().trim().to_uppercase();
        if normalized.is_empty() {
            return Err(FincacheError::Validation(ValidationError::RequiredFieldMissing {
                field: "subject_key".to_string(),
            }));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SubjectKey {
    type Error = FincacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubjectKey> for String {
    fn from(key: SubjectKey) -> Self {
        key.0
    }
}

impl AsRef<str> for SubjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_key_normalizes() {
        let key = SubjectKey::new("  reliance.ns ").unwrap();
        assert_eq!(key.as_str(), "RELIANCE.NS");
        assert_eq!(key, SubjectKey::new("RELIANCE.NS").unwrap());
    }

    #[test]
    fn test_subject_key_rejects_blank() {
        assert!(matches!(
            SubjectKey::new("   "),
            Err(FincacheError::Validation(ValidationError::RequiredFieldMissing { .. }))
        ));
        assert!(serde_json::from_str::<SubjectKey>(r#""""#).is_err());
    }

    #[test]
    fn test_subject_key_serde_normalizes() {
        let key: SubjectKey = serde_json::from_str(r#"" tcs""#).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), r#""TCS""#);
    }

    #[test]
    fn test_payload_hash_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b":1,"a":[1,2]}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"a":[1,2],"b":1}"#).unwrap();
        assert_eq!(payload_hash(&a), payload_hash(&b));
        assert_ne!(payload_hash(&a), payload_hash(&serde_json::json!({"a": [2, 1], "b": 1})));
    }
}
