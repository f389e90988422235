//! Enum types for fincache documents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DOCUMENT CLASS
// ============================================================================

/// Independently versioned, independently cached category of document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentClass {
    /// Annual report / balance sheet, versioned by fiscal year ("FY2025").
    Annual,
    /// Quarterly results, versioned by quarter label ("Q3FY25").
    Quarterly,
    /// Earnings call transcript summary, versioned by quarter label.
    EarningsCall,
}

impl DocumentClass {
    /// Every class, in processing order.
    pub const ALL: [DocumentClass; 3] = [
        DocumentClass::Annual,
        DocumentClass::Quarterly,
        DocumentClass::EarningsCall,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DocumentClass::Annual => "annual",
            DocumentClass::Quarterly => "quarterly",
            DocumentClass::EarningsCall => "earnings_call",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, DocumentClassParseError> {
        match s.to_lowercase().as_str() {
            "annual" => Ok(DocumentClass::Annual),
            "quarterly" => Ok(DocumentClass::Quarterly),
            "earnings_call" | "earningscall" => Ok(DocumentClass::EarningsCall),
            _ => Err(DocumentClassParseError(s.to_string())),
        }
    }

    /// Whether documents of this class carry a balance-sheet style statement.
    pub fn carries_statement(&self) -> bool {
        matches!(self, DocumentClass::Annual | DocumentClass::Quarterly)
    }

    /// Cache duration class applied to documents of this class.
    pub fn duration_class(&self) -> CacheDurationClass {
        match self {
            DocumentClass::Annual => CacheDurationClass::AnnualDocument,
            DocumentClass::Quarterly | DocumentClass::EarningsCall => {
                CacheDurationClass::QuarterlyDocument
            }
        }
    }
}

impl fmt::Display for DocumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for DocumentClass {
    type Err = DocumentClassParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid document class string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentClassParseError(pub String);

impl fmt::Display for DocumentClassParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid document class: {}", self.0)
    }
}

impl std::error::Error for DocumentClassParseError {}

// ============================================================================
// DATA SOURCE
// ============================================================================

/// Where a class in a reconciled bundle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Served from the in-memory cache or the document store.
    Cache,
    /// Regenerated during this request.
    Fresh,
    /// Could not be produced; the outcome carries a reason.
    Error,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Cache => "cache",
            DataSource::Fresh => "fresh",
            DataSource::Error => "error",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CACHE DURATION CLASS
// ============================================================================

/// Named freshness windows. The concrete durations live in
/// [`CacheDurations`](crate::CacheDurations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDurationClass {
    /// Live price data.
    Price,
    /// Anything without a more specific class.
    Default,
    /// AI-derived analysis (blended forecasts, narratives).
    Analysis,
    /// Fundamentals (ratios, profile data).
    Fundamentals,
    /// Quarterly results and earnings calls.
    QuarterlyDocument,
    /// Annual reports.
    AnnualDocument,
}
