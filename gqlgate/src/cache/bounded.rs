// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cost-bounded LRU cache

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{CacheStats, CompilationCache};

struct Slot<V> {
    value: V,
    cost: u64,
    tick: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Slot<V>>,
    /// Access tick to key, oldest first
    recency: BTreeMap<u64, K>,
    tick: u64,
    used_cost: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &K) -> Option<Slot<V>> {
        let slot = self.entries.remove(key)?;
        self.recency.remove(&slot.tick);
        self.used_cost = self.used_cost.saturating_sub(slot.cost);
        Some(slot)
    }
}

/// A cache holding at most `max_cost` worth of entries. Inserting past the
/// limit evicts least recently used entries; an entry costing more than the
/// whole budget is rejected.
pub struct BoundedCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    max_cost: u64,
    closed: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    rejections: AtomicU64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(max_cost: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
                used_cost: 0,
            }),
            max_cost,
            closed: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    pub fn max_cost(&self) -> u64 {
        self.max_cost
    }

    pub fn used_cost(&self) -> u64 {
        self.inner.lock().used_cost
    }
}

impl<K, V> CompilationCache<K, V> for BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        if self.closed.load(Ordering::Acquire) {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let mut inner = self.inner.lock();
        let tick = inner.next_tick();
        let found = match inner.entries.get_mut(key) {
            Some(slot) => {
                let previous = std::mem::replace(&mut slot.tick, tick);
                Some((previous, slot.value.clone()))
            }
            None => None,
        };

        match found {
            Some((previous, value)) => {
                inner.recency.remove(&previous);
                inner.recency.insert(tick, key.clone());
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn set(&self, key: K, value: V, cost: u64) -> bool {
        let cost = cost.max(1);
        if cost > self.max_cost {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let mut inner = self.inner.lock();
        // `close` flips the flag under this lock, so nothing lands after the clear
        if self.closed.load(Ordering::Acquire) {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        inner.remove(&key);

        while inner.used_cost + cost > self.max_cost {
            let Some((_, oldest)) = inner.recency.pop_first() else {
                break;
            };
            if let Some(evicted) = inner.entries.remove(&oldest) {
                inner.used_cost = inner.used_cost.saturating_sub(evicted.cost);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        let tick = inner.next_tick();
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(key, Slot { value, cost, tick });
        inner.used_cost += cost;
        true
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        inner.entries.clear();
        inner.recency.clear();
        inner.used_cost = 0;
    }

    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            current_entries: inner.entries.len(),
            current_cost: inner.used_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_eviction_reports_miss() {
        let cache = BoundedCache::new(1);
        assert!(cache.set("a", 1, 1));
        assert!(cache.set("b", 2, 1));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_recently_read_entries_survive() {
        let cache = BoundedCache::new(2);
        cache.set("a", 1, 1);
        cache.set("b", 2, 1);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.set("c", 3, 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_weighted_costs() {
        let cache = BoundedCache::new(10);
        cache.set("small1", 1, 3);
        cache.set("small2", 2, 3);
        assert!(cache.set("large", 3, 8));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_cost(), 8);

        assert!(!cache.set("huge", 4, 11));
        assert_eq!(cache.get(&"huge"), None);
        assert_eq!(cache.stats().rejections, 1);
    }

    #[test]
    fn test_overwrite_replaces_cost() {
        let cache = BoundedCache::new(4);
        cache.set("a", 1, 3);
        cache.set("a", 2, 2);
        assert_eq!(cache.used_cost(), 2);
        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[test]
    fn test_zero_cost_counts_as_one() {
        let cache = BoundedCache::new(2);
        for i in 0..5 {
            cache.set(i, i, 0);
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let cache = BoundedCache::new(4);
        cache.set("a", 1, 1);
        cache.close();
        cache.close();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get(&"a"), None);
        assert!(!cache.set("b", 2, 1));
    }

    #[test]
    fn test_close_racing_with_writers_leaves_nothing_behind() {
        for _ in 0..20 {
            let cache = Arc::new(BoundedCache::new(10_000));
            let writers: Vec<_> = (0..4u64)
                .map(|t| {
                    let cache = Arc::clone(&cache);
                    std::thread::spawn(move || {
                        for i in 0..2_000u64 {
                            cache.set(t * 2_000 + i, i, 1);
                        }
                    })
                })
                .collect();
            std::thread::yield_now();
            cache.close();
            for writer in writers {
                writer.join().unwrap();
            }

            assert_eq!(cache.len(), 0);
            assert_eq!(cache.used_cost(), 0);
        }
    }

    #[test]
    fn test_concurrent_access_stays_bounded() {
        let cache = Arc::new(BoundedCache::new(64));
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..1_000u64 {
                        let key = (t * 1_000 + i) % 200;
                        if cache.get(&key).is_none() {
                            cache.set(key, key * 2, 1);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= 64);
        assert!(cache.used_cost() <= 64);
        for key in 0..200u64 {
            if let Some(value) = cache.get(&key) {
                assert_eq!(value, key * 2);
            }
        }
    }
}
