//! Per-class schema profiles.
//!
//! Each generated document class has a fixed JSON layout. The profile names
//! the fields the rest of the pipeline relies on, most importantly the
//! "safe cut" field: the last field whose complete presence still yields a
//! usable document if the generator output is truncated after it.

use fincache_core::DocumentClass;
use serde::Serialize;

/// Field layout of one schema version of one document class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemaProfile {
    pub class: DocumentClass,
    pub schema_version: u32,
    /// Top-level array field that recovery may cut after.
    pub safe_cut_field: &'static str,
    /// Field carrying the document's own version label.
    pub version_field: &'static str,
    /// Object holding balance-sheet figures, for classes that carry one.
    pub statement_field: Option<&'static str>,
}

pub const ANNUAL_V1: SchemaProfile = SchemaProfile {
    class: DocumentClass::Annual,
    schema_version: 1,
    safe_cut_field: "risks",
    version_field: "fiscalYear",
    statement_field: Some("financials"),
};

pub const QUARTERLY_V1: SchemaProfile = SchemaProfile {
    class: DocumentClass::Quarterly,
    schema_version: 1,
    safe_cut_field: "opportunities",
    version_field: "quarter",
    statement_field: Some("financials"),
};

pub const EARNINGS_CALL_V1: SchemaProfile = SchemaProfile {
    class: DocumentClass::EarningsCall,
    schema_version: 1,
    safe_cut_field: "keyTakeaways",
    version_field: "quarter",
    statement_field: None,
};

impl SchemaProfile {
    /// Current profile for a document class.
    pub fn for_class(class: DocumentClass) -> &'static SchemaProfile {
        match class {
            DocumentClass::Annual => &ANNUAL_V1,
            DocumentClass::Quarterly => &QUARTERLY_V1,
            DocumentClass::EarningsCall => &EARNINGS_CALL_V1,
        }
    }

    /// Version label embedded in a payload, if present as a string.
    pub fn version_of<'a>(&self, payload: &'a serde_json::Value) -> Option<&'a str> {
        payload
            .get(self.version_field)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
