//! Single-slot TTL cache for volatile account state
//!
//! Readers take a shared guard, writers an exclusive one; guards are held
//! only around the in-memory access, never across network calls. Concurrent
//! misses are not coalesced: overlapping fetches may both run and both
//! store, last writer wins.

use parking_lot::RwLock;
use std::time::{Duration, Instant};

struct Entry<T> {
    payload: T,
    fetched_at: Instant,
}

/// Read-through cache holding one value under a fixed TTL.
pub struct TtlCache<T> {
    slot: RwLock<Option<Entry<T>>>,
    ttl: Duration,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
        }
    }

    /// Returns the cached value iff it is younger than the TTL.
    pub fn get(&self) -> Option<T> {
        let guard = self.slot.read();
        match guard.as_ref() {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(entry.payload.clone()),
            _ => None,
        }
    }

    /// Age of the cached value, fresh or not.
    pub fn age(&self) -> Option<Duration> {
        self.slot.read().as_ref().map(|entry| entry.fetched_at.elapsed())
    }

    /// Installs a freshly fetched value, restarting the TTL window.
    pub fn store(&self, payload: T) {
        *self.slot.write() = Some(Entry {
            payload,
            fetched_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_misses() {
        let cache: TtlCache<u64> = TtlCache::new(Duration::from_secs(15));
        assert_eq!(cache.get(), None);
        assert_eq!(cache.age(), None);
    }

    #[test]
    fn hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(15));
        cache.store(vec!["BTCUSDT".to_string()]);
        assert_eq!(cache.get(), Some(vec!["BTCUSDT".to_string()]));
    }

    #[test]
    fn miss_after_expiry() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.store(1u64);
        assert_eq!(cache.get(), Some(1));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(), None);
        // expired entries still report their age
        assert!(cache.age().unwrap() >= Duration::from_millis(40));
    }

    #[test]
    fn store_restarts_the_window() {
        let cache = TtlCache::new(Duration::from_millis(50));
        cache.store(1u64);
        std::thread::sleep(Duration::from_millis(30));
        cache.store(2u64);
        std::thread::sleep(Duration::from_millis(30));
        // 60ms after the first store, 30ms after the second: still fresh
        assert_eq!(cache.get(), Some(2));
    }

    #[test]
    fn empty_collection_is_a_valid_cached_value() {
        let cache: TtlCache<Vec<u64>> = TtlCache::new(Duration::from_secs(15));
        cache.store(Vec::new());
        assert_eq!(cache.get(), Some(Vec::new()));
    }
}
