//! Versioned documents and their data-quality record.

use crate::{payload_hash, ContentHash, DocumentClass, SubjectKey, Timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// VALIDATION WARNINGS
// ============================================================================

/// Non-fatal finding attached to a document's quality record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// Total liabilities were (nearly) identical to total assets and were
    /// discarded as an extraction error.
    LiabilitiesMisextracted { total_assets: f64, total_liabilities: f64 },
    /// Assets do not equal equity plus liabilities within tolerance.
    EquationMismatch {
        total_assets: f64,
        total_equity: f64,
        total_liabilities: f64,
        diff: f64,
    },
    /// Not enough figures to check the balance-sheet equation.
    MissingFigures { missing: Vec<String> },
    /// Figures mix integer and decimal formats at very different magnitudes.
    ScaleInconsistent {
        integer_magnitude: i32,
        decimal_magnitude: i32,
    },
    /// Total assets are below the plausible minimum for the period.
    BelowPeriodMinimum { total_assets: f64, minimum: f64 },
}

impl ValidationWarning {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationWarning::LiabilitiesMisextracted { .. } => "liabilities_misextracted",
            ValidationWarning::EquationMismatch { .. } => "equation_mismatch",
            ValidationWarning::MissingFigures { .. } => "missing_figures",
            ValidationWarning::ScaleInconsistent { .. } => "scale_inconsistent",
            ValidationWarning::BelowPeriodMinimum { .. } => "below_period_minimum",
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::LiabilitiesMisextracted {
                total_assets,
                total_liabilities,
            } => write!(
                f,
                "total liabilities {} matches total assets {}; discarded",
                total_liabilities, total_assets
            ),
            ValidationWarning::EquationMismatch {
                total_assets,
                total_equity,
                total_liabilities,
                diff,
            } => write!(
                f,
                "assets {} != equity {} + liabilities {} (diff {})",
                total_assets, total_equity, total_liabilities, diff
            ),
            ValidationWarning::MissingFigures { missing } => {
                write!(f, "missing figures: {}", missing.join(", "))
            }
            ValidationWarning::ScaleInconsistent {
                integer_magnitude,
                decimal_magnitude,
            } => write!(
                f,
                "integer figures ~1e{} vs decimal figures ~1e{}; possible unit mix",
                integer_magnitude, decimal_magnitude
            ),
            ValidationWarning::BelowPeriodMinimum {
                total_assets,
                minimum,
            } => write!(f, "total assets {} below period minimum {}", total_assets, minimum),
        }
    }
}

// ============================================================================
// DATA QUALITY
// ============================================================================

/// How much of a document can be trusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    /// Payload was salvaged from a truncated generation.
    pub recovered: bool,
    /// Fields computed rather than extracted, e.g. `totalLiabilities.current`.
    pub derived_fields: Vec<String>,
    pub warnings: Vec<ValidationWarning>,
}

impl DataQuality {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        !self.recovered && self.derived_fields.is_empty() && self.warnings.is_empty()
    }
}

// ============================================================================
// VERSIONED DOCUMENT
// ============================================================================

/// One generated document at one logical version.
///
/// Identity is `(subject_key, document_class, version_label)`. Documents are
/// never mutated; a newer version supersedes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedDocument {
    pub subject_key: SubjectKey,
    pub document_class: DocumentClass,
    pub version_label: String,
    pub payload: serde_json::Value,
    pub fetched_at: Timestamp,
    pub expires_at: Timestamp,
    pub quality: DataQuality,
    pub content_hash: ContentHash,
}

impl VersionedDocument {
    /// Build a document fetched at `fetched_at` that stays valid for `ttl`.
    pub fn new(
        subject_key: SubjectKey,
        document_class: DocumentClass,
        version_label: impl Into<String>,
        payload: serde_json::Value,
        fetched_at: Timestamp,
        ttl: Duration,
        quality: DataQuality,
    ) -> Self {
        let content_hash = payload_hash(&payload);
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| fetched_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            subject_key,
            document_class,
            version_label: version_label.into(),
            payload,
            fetched_at,
            expires_at,
            quality,
            content_hash,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Natural key as used by document stores.
    pub fn natural_key(&self) -> (&SubjectKey, DocumentClass, &str) {
        (&self.subject_key, self.document_class, &self.version_label)
    }

    pub fn content_hash_hex(&self) -> String {
        hex::encode(self.content_hash)
    }
}

/// Result of writing a document to a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Same natural key and identical content hash.
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn doc(payload: serde_json::Value) -> VersionedDocument {
        VersionedDocument::new(
            SubjectKey::new("tcs").unwrap(),
            DocumentClass::Quarterly,
            "Q3FY25",
            payload,
            Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap(),
            Duration::from_secs(90 * 24 * 3600),
            DataQuality::clean(),
        )
    }

    #[test]
    fn test_expires_at_is_fetched_plus_ttl() {
        let d = doc(json!({"a": 1}));
        assert_eq!(d.expires_at, Utc.with_ymd_and_hms(2025, 4, 10, 0, 0, 0).unwrap());
        assert!(!d.is_expired(Utc.with_ymd_and_hms(2025, 4, 9, 23, 59, 59).unwrap()));
        assert!(d.is_expired(d.expires_at));
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        let a = doc(json!({"x": 1, "y": [1, 2]}));
        let b = doc(serde_json::from_str(r#"{"y":[1,2],"x":1}"#).unwrap());
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash_hex().len(), 64);
        assert_ne!(a.content_hash, doc(json!({"x": 2})).content_hash);
    }

    #[test]
    fn test_warning_display_and_code() {
        let w = ValidationWarning::MissingFigures {
            missing: vec!["totalEquity.current".to_string()],
        };
        assert_eq!(w.code(), "missing_figures");
        assert!(w.to_string().contains("totalEquity.current"));
    }

    #[test]
    fn test_warning_serializes_tagged() {
        let w = ValidationWarning::BelowPeriodMinimum {
            total_assets: 12.0,
            minimum: 1000.0,
        };
        let value = serde_json::to_value(&w).unwrap();
        assert_eq!(value["kind"], "below_period_minimum");
    }

    #[test]
    fn test_data_quality_clean() {
        assert!(DataQuality::clean().is_clean());
        let q = DataQuality {
            recovered: true,
            ..Default::default()
        };
        assert!(!q.is_clean());
    }
}
