//! In-memory TTL cache with caller-supplied freshness windows.
//!
//! The cache stores a write timestamp per entry and nothing else about
//! expiry: each lookup states the window it is willing to accept, so the
//! same entry can be fresh for one caller and stale for another.

use dashmap::DashMap;
use fincache_core::{Clock, SystemClock, Timestamp};
use serde_json::{Map, Value};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::traits::CacheStats;

/// One stored value. Replaced wholesale on every write.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: Timestamp,
    pub metadata: Map<String, Value>,
    generation: u64,
}

/// A visible entry returned by [`TtlCache::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    pub value: T,
    pub stored_at: Timestamp,
    pub age: Duration,
    pub metadata: Map<String, Value>,
}

/// Age of an entry; entries stamped in the future count as brand new.
pub fn entry_age(stored_at: Timestamp, now: Timestamp) -> Duration {
    (now - stored_at).to_std().unwrap_or(Duration::ZERO)
}

/// Keyed in-memory cache with lazy, per-lookup expiry.
///
/// Writes are last-write-wins. Expired entries are removed when a read
/// observes them; there is no background sweep.
///
/// There is no stampede protection: N concurrent misses on one key all
/// report a miss and may all regenerate. That costs upstream work, never
/// correctness, since the last write wins and every write is a complete
/// value.
///
/// Instances are meant to be shared behind an `Arc` and injected; nothing
/// here is global.
pub struct TtlCache<K, T, C = SystemClock>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<T>>,
    clock: C,
    next_generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, T> TtlCache<K, T, SystemClock>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<K, T> Default for TtlCache<K, T, SystemClock>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, C> TtlCache<K, T, C>
where
    K: Eq + Hash + Clone,
    T: Clone,
    C: Clock,
{
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            next_generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Store `value` stamped with the current time.
    pub fn put(&self, key: K, value: T) {
        self.put_at(key, value, Map::new(), self.clock.now());
    }

    pub fn put_with_metadata(&self, key: K, value: T, metadata: Map<String, Value>) {
        self.put_at(key, value, metadata, self.clock.now());
    }

    /// Store `value` with an explicit write stamp, e.g. when re-warming from
    /// a persistent store so the entry ages from the original fetch time.
    pub fn put_at(&self, key: K, value: T, metadata: Map<String, Value>, stored_at: Timestamp) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at,
                metadata,
                generation,
            },
        );
    }

    /// Look up `key`, accepting entries younger than `max_age`.
    pub fn get(&self, key: &K, max_age: Duration) -> Option<CacheHit<T>> {
        self.get_at(key, max_age, self.clock.now())
    }

    /// [`get`](Self::get) evaluated at an explicit instant.
    pub fn get_at(&self, key: &K, max_age: Duration, now: Timestamp) -> Option<CacheHit<T>> {
        let expired_generation = match self.entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) => {
                let age = entry_age(entry.stored_at, now);
                if age < max_age {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(CacheHit {
                        value: entry.value.clone(),
                        stored_at: entry.stored_at,
                        age,
                        metadata: entry.metadata.clone(),
                    });
                }
                entry.generation
            }
        };

        // Only the entry observed as expired goes; a concurrent put survives.
        if self
            .entries
            .remove_if(key, |_, entry| entry.generation == expired_generation)
            .is_some()
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Remove `key` regardless of age. Returns whether an entry existed.
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet observed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<K, T, C> std::fmt::Debug for TtlCache<K, T, C>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
