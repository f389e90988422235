//! Logical version labels ("FY2025", "Q3FY25") and their ordering.
//!
//! Labels are compared numerically, never as strings. `"FY9"` sorts before
//! `"FY25"`, and `"FY25"` / `"FY2025"` are the same period.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

static QUARTER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Q(\d)FY(\d{1,4})$").expect("Invalid quarter label regex"));

static ANNUAL_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^FY(\d{1,4})$").expect("Invalid annual label regex"));

/// Fiscal period a version label denotes.
///
/// `quarter` is `None` for annual labels. Ordering is the derived tuple
/// ordering on `(year, quarter)` with annual sorting before any quarter of
/// the same year; use [`compare_versions`] for the mixed-granularity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FiscalPeriod {
    pub year: u16,
    pub quarter: Option<u8>,
}

impl FiscalPeriod {
    pub fn annual(year: u16) -> Self {
        Self { year, quarter: None }
    }

    pub fn quarterly(year: u16, quarter: u8) -> Self {
        Self {
            year,
            quarter: Some(quarter),
        }
    }

    pub fn is_quarterly(&self) -> bool {
        self.quarter.is_some()
    }

    /// Canonical label: `FY2025` or `Q3FY2025`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quarter {
            Some(q) => write!(f, "Q{}FY{}", q, self.year),
            None => write!(f, "FY{}", self.year),
        }
    }
}

fn normalize_year(digits: &str) -> Option<u16> {
    let value: u16 = digits.parse().ok()?;
    match digits.len() {
        1 | 2 => Some(2000 + value),
        4 => Some(value),
        _ => None,
    }
}

/// Parse a version label into a [`FiscalPeriod`].
///
/// Case-insensitive; whitespace, `-` and `_` separators are ignored. One- or
/// two-digit years map to `2000 + y`. Returns `None` for anything else,
/// including quarter ordinals outside `1..=4`.
pub fn parse_version_label(label: &str) -> Option<FiscalPeriod> {
    let compact: String = label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect::<String>()
        .to_uppercase();

    if let Some(caps) = QUARTER_LABEL.captures(&compact) {
        let quarter: u8 = caps[1].parse().ok()?;
        if !(1..=4).contains(&quarter) {
            return None;
        }
        let year = normalize_year(&caps[2])?;
        return Some(FiscalPeriod::quarterly(year, quarter));
    }

    let caps = ANNUAL_LABEL.captures(&compact)?;
    normalize_year(&caps[1]).map(FiscalPeriod::annual)
}

fn compare_periods(a: &FiscalPeriod, b: &FiscalPeriod) -> Ordering {
    match (a.quarter, b.quarter) {
        (Some(qa), Some(qb)) => (a.year, qa).cmp(&(b.year, qb)),
        _ => a.year.cmp(&b.year),
    }
}

/// Which side of a comparison could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnparsedSide {
    Left,
    Right,
    Both,
}

/// Result of [`compare_checked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionComparison {
    pub ordering: Ordering,
    pub unparsed: Option<UnparsedSide>,
}

impl VersionComparison {
    pub fn is_reliable(&self) -> bool {
        self.unparsed.is_none()
    }
}

/// Compare two labels, reporting parse failures alongside the ordering.
///
/// When either label fails to parse the ordering is `Equal`.
pub fn compare_checked(a: &str, b: &str) -> VersionComparison {
    match (parse_version_label(a), parse_version_label(b)) {
        (Some(pa), Some(pb)) => VersionComparison {
            ordering: compare_periods(&pa, &pb),
            unparsed: None,
        },
        (None, Some(_)) => VersionComparison {
            ordering: Ordering::Equal,
            unparsed: Some(UnparsedSide::Left),
        },
        (Some(_), None) => VersionComparison {
            ordering: Ordering::Equal,
            unparsed: Some(UnparsedSide::Right),
        },
        (None, None) => VersionComparison {
            ordering: Ordering::Equal,
            unparsed: Some(UnparsedSide::Both),
        },
    }
}

/// Numeric ordering of two version labels.
///
/// Quarterly vs quarterly compares `(year, quarter)`; anything involving an
/// annual label compares by year only. Unparsable labels compare `Equal`.
///
/// Mixed quarterly/annual comparisons make this a non-transitive relation:
/// `Q1FY25 == FY2025 == Q3FY25` while `Q1FY25 < Q3FY25`. It is not a total
/// order, so never sort or dedupe a mixed list with it. Callers compare
/// labels of one document class, which are always the same granularity.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    compare_checked(a, b).ordering
}

// ============================================================================
// TESTS
// ============================================================================
