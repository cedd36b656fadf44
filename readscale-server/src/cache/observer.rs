use super::types::{CacheError, Ttl};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// What the cache-aside layer did for one invocation step
#[derive(Debug)]
pub enum CacheEvent<'a> {
    /// Entry found and decoded; the wrapped operation was skipped
    Hit { key: &'a str },
    /// No entry for the key
    Miss { key: &'a str },
    /// Backend error or timeout during lookup, served as a miss
    LookupFailed { key: &'a str, error: &'a CacheError },
    /// Entry present but its payload did not decode, served as a miss
    DecodeFailed { key: &'a str },
    Stored { key: &'a str, ttl: Ttl },
    StoreFailed { key: &'a str, error: &'a CacheError },
    /// Result was empty and deliberately not cached
    SkippedEmpty { key: &'a str },
}

/// Hook for telling apart the paths that callers cannot see
pub trait CacheObserver: Send + Sync {
    fn on_event(&self, event: &CacheEvent<'_>);
}

/// Counting observer
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    lookup_failures: AtomicU64,
    decode_failures: AtomicU64,
    stores: AtomicU64,
    store_failures: AtomicU64,
    skipped_empty: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub lookup_failures: u64,
    pub decode_failures: u64,
    pub stores: u64,
    pub store_failures: u64,
    pub skipped_empty: u64,
}

impl CacheStatsSnapshot {
    /// Lookups that fell through to the wrapped operation, whatever the cause
    pub fn effective_misses(&self) -> u64 {
        self.misses + self.lookup_failures + self.decode_failures
    }

    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.effective_misses();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            skipped_empty: self.skipped_empty.load(Ordering::Relaxed),
        }
    }
}

impl CacheObserver for CacheStats {
    fn on_event(&self, event: &CacheEvent<'_>) {
        let counter = match event {
            CacheEvent::Hit { .. } => &self.hits,
            CacheEvent::Miss { .. } => &self.misses,
            CacheEvent::LookupFailed { .. } => &self.lookup_failures,
            CacheEvent::DecodeFailed { .. } => &self.decode_failures,
            CacheEvent::Stored { .. } => &self.stores,
            CacheEvent::StoreFailed { .. } => &self.store_failures,
            CacheEvent::SkippedEmpty { .. } => &self.skipped_empty,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
