//! Version-based freshness decisions.
//!
//! TTL expiry answers "is this entry too old to show?". This module answers a
//! different question: "has upstream published a newer logical version than
//! the one we hold?". A document can be well inside its TTL and still be
//! superseded by a newly released quarter.

use fincache_core::compare_checked;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// What to do with a cached document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessAction {
    Reuse,
    Refresh,
}

/// Why a [`FreshnessAction`] was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessReason {
    /// Caller asked for a refresh.
    Forced,
    /// Nothing cached for this class.
    NoCachedVersion,
    /// Upstream version unknown; fail open to the cached copy.
    ProbeUnavailable,
    /// Upstream has a strictly newer version.
    NewerVersion,
    /// Cached version is current (or newer than upstream reports).
    UpToDate,
    /// One of the labels could not be parsed; treated as equal.
    UnparsableLabel,
}

/// Outcome of [`FreshnessChecker::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessDecision {
    pub action: FreshnessAction,
    pub reason: FreshnessReason,
}

impl FreshnessDecision {
    fn reuse(reason: FreshnessReason) -> Self {
        Self {
            action: FreshnessAction::Reuse,
            reason,
        }
    }

    fn refresh(reason: FreshnessReason) -> Self {
        Self {
            action: FreshnessAction::Refresh,
            reason,
        }
    }

    pub fn should_refresh(&self) -> bool {
        self.action == FreshnessAction::Refresh
    }

    pub fn should_reuse(&self) -> bool {
        self.action == FreshnessAction::Reuse
    }

    /// Decision rests on a label that failed to parse.
    pub fn needs_warning(&self) -> bool {
        self.reason == FreshnessReason::UnparsableLabel
    }
}

/// Decides, per document class, whether a cached version may be reused.
///
/// Stateless; each class is checked independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreshnessChecker;

impl FreshnessChecker {
    pub fn new() -> Self {
        Self
    }

    /// Compare the cached label against the latest upstream label.
    ///
    /// | force | cached  | latest  | decision                       |
    /// |-------|---------|---------|--------------------------------|
    /// | true  | any     | any     | refresh (forced)               |
    /// | false | absent  | any     | refresh (no cached version)    |
    /// | false | present | absent  | reuse (probe unavailable)      |
    /// | false | present | newer   | refresh (newer version)        |
    /// | false | present | not newer | reuse (up to date)           |
    pub fn decide(
        &self,
        cached_version: Option<&str>,
        latest_known_version: Option<&str>,
        force_refresh: bool,
    ) -> FreshnessDecision {
        if force_refresh {
            return FreshnessDecision::refresh(FreshnessReason::Forced);
        }
        let Some(cached) = cached_version else {
            return FreshnessDecision::refresh(FreshnessReason::NoCachedVersion);
        };
        let Some(latest) = latest_known_version else {
            return FreshnessDecision::reuse(FreshnessReason::ProbeUnavailable);
        };

        let comparison = compare_checked(latest, cached);
        match (comparison.unparsed, comparison.ordering) {
            (Some(_), _) => FreshnessDecision::reuse(FreshnessReason::UnparsableLabel),
            (None, Ordering::Greater) => FreshnessDecision::refresh(FreshnessReason::NewerVersion),
            (None, Ordering::Less | Ordering::Equal) => {
                FreshnessDecision::reuse(FreshnessReason::UpToDate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(cached: Option<&str>, latest: Option<&str>, force: bool) -> FreshnessDecision {
        FreshnessChecker::new().decide(cached, latest, force)
    }

    #[test]
    fn test_force_always_refreshes() {
        let d = decide(Some("Q3FY25"), Some("Q3FY25"), true);
        assert!(d.should_refresh());
        assert_eq!(d.reason, FreshnessReason::Forced);
        assert_eq!(decide(None, None, true).reason, FreshnessReason::Forced);
    }

    #[test]
    fn test_nothing_cached_refreshes() {
        let d = decide(None, Some("FY2025"), false);
        assert!(d.should_refresh());
        assert_eq!(d.reason, FreshnessReason::NoCachedVersion);
        assert_eq!(decide(None, None, false).reason, FreshnessReason::NoCachedVersion);
    }

    #[test]
    fn test_probe_failure_fails_open() {
        let d = decide(Some("FY2024"), None, false);
        assert!(d.should_reuse());
        assert_eq!(d.reason, FreshnessReason::ProbeUnavailable);
    }

    #[test]
    fn test_newer_quarter_refreshes() {
        let d = decide(Some("Q2FY25"), Some("Q3FY25"), false);
        assert!(d.should_refresh());
        assert_eq!(d.reason, FreshnessReason::NewerVersion);
    }

    #[test]
    fn test_same_or_older_reuses() {
        assert_eq!(
            decide(Some("Q3FY25"), Some("Q3 FY2025"), false).reason,
            FreshnessReason::UpToDate
        );
        assert_eq!(
            decide(Some("FY2026"), Some("FY2025"), false).reason,
            FreshnessReason::UpToDate
        );
    }

    #[test]
    fn test_unparsable_reuses_with_warning() {
        let d = decide(Some("latest"), Some("Q3FY25"), false);
        assert!(d.should_reuse());
        assert!(d.needs_warning());
        let d = decide(Some("Q3FY25"), Some("n/a"), false);
        assert!(d.needs_warning());
    }

    #[test]
    fn test_numeric_not_lexical_comparison() {
        // "FY9" > "FY10" as strings; numerically older.
        let d = decide(Some("FY9"), Some("FY10"), false);
        assert_eq!(d.reason, FreshnessReason::NewerVersion);
    }
}
