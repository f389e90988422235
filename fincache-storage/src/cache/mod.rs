//! In-memory cache layer.
//!
//! Two independent questions decide whether cached data is served:
//!
//! - **Age**: [`TtlCache`] hides entries older than the window the caller
//!   passes on each lookup.
//! - **Version**: [`FreshnessChecker`] compares the cached logical version
//!   with the latest one upstream reports.
//!
//! # Example
//!
//! ```ignore
//! let cache: TtlCache<SubjectKey, BlendedForecast> = TtlCache::new();
//! cache.put(key.clone(), forecast);
//!
//! // Each caller picks its own window
//! let hit = cache.get(&key, durations.duration(CacheDurationClass::Analysis));
//! ```

pub mod freshness;
pub mod traits;
pub mod ttl;

pub use freshness::{FreshnessAction, FreshnessChecker, FreshnessDecision, FreshnessReason};
pub use traits::CacheStats;
pub use ttl::{entry_age, CacheEntry, CacheHit, TtlCache};
