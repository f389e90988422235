//! FINCACHE Storage - Cache and Document Store
//!
//! The in-memory TTL cache, version-based freshness decisions, and the
//! document store contract with an in-memory implementation.

pub mod cache;
pub mod store;

pub use cache::{
    entry_age, CacheEntry, CacheHit, CacheStats, FreshnessAction, FreshnessChecker,
    FreshnessDecision, FreshnessReason, TtlCache,
};
pub use store::{by_recency, DocumentStore, InMemoryDocumentStore};
