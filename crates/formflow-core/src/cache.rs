//! Bounded LRU cache shared across threads
//!
//! Lookups go straight to the sharded map and refresh the entry's access stamp.
//! Inserts are serialized so the entry count never exceeds the capacity; a full cache
//! evicts the entry with the oldest stamp before taking a new key.

use dashmap::DashMap;
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

struct Slot<V> {
    value: V,
    last_access: AtomicU64,
}

/// Least recently used cache with a fixed capacity
///
/// A capacity of zero stores nothing.
pub struct LruCache<K, V> {
    capacity: usize,
    entries: DashMap<K, Slot<V>>,
    clock: AtomicU64,
    evictions: AtomicU64,
    insert_lock: Mutex<()>,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: DashMap::with_capacity(capacity),
            clock: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            insert_lock: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get a value, marking it most recently used
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|slot| {
            slot.last_access.store(self.tick(), Ordering::Relaxed);
            slot.value.clone()
        })
    }

    /// Insert or replace a value, evicting the least recently used entry when full
    pub fn insert(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        let _guard = self.insert_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.capacity {
                if !self.evict_lru() {
                    break;
                }
            }
        }

        let slot = Slot { value, last_access: AtomicU64::new(self.tick()) };
        self.entries.insert(key, slot);
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        let _guard = self.insert_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            capacity: self.capacity,
            size: self.entries.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Caller holds `insert_lock`
    fn evict_lru(&self) -> bool {
        // The iterator's shard guards must be released before `remove`
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_access.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                self.entries.remove(&key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

impl<K: Hash + Eq, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("size", &self.entries.len())
            .field("evictions", &self.evictions.load(Ordering::Relaxed))
            .finish()
    }
}

/// Cache occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub capacity: usize,
    pub size: usize,
    pub evictions: u64,
}

impl CacheStats {
    /// Occupancy as a percentage of capacity
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 { 0.0 } else { (self.size as f64 / self.capacity as f64) * 100.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_operations() {
        let cache = LruCache::new(3);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);

        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), None);
        assert_eq!(cache.len(), 2);

        cache.insert("a".to_string(), 10);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);

        cache.get(&"a");
        cache.insert("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_replacing_a_key_at_capacity_does_not_evict() {
        let cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("b", 20);

        assert!(cache.contains_key(&"a"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = LruCache::new(0);
        cache.insert("a", 1);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().utilization(), 0.0);
    }

    #[test]
    fn test_size_stays_within_capacity() {
        let cache = LruCache::new(16);
        for i in 0..1000 {
            cache.insert(i, i * 2);
            assert!(cache.len() <= 16);
        }
        assert_eq!(cache.stats(), CacheStats { capacity: 16, size: 16, evictions: 984 });
        assert_eq!(cache.stats().utilization(), 100.0);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_inserts_respect_capacity() {
        let cache = Arc::new(LruCache::new(32));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500 {
                        cache.insert(t * 1000 + i, i);
                        cache.get(&(t * 1000 + i / 2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= 32);
    }
}
