// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Compilation caches
//!
//! This module provides:
//! - the `CompilationCache` capability and its bounded and no-op backends
//! - cache sets bundling the plan, normalization and validation caches of one
//!   schema version
//! - the routing table mapping tenant keys to their active cache set

pub mod bounded;
pub mod cache_config;
pub mod cache_set;
pub mod noop;
pub mod registry;

pub use bounded::BoundedCache;
pub use cache_config::{CacheConfig, CostPolicy, LevelConfig};
pub use cache_set::{CacheLease, CacheSet, CacheSetKey, CacheSetState};
pub use noop::NoopCache;
pub use registry::CacheRegistry;

use serde::Serialize;
use std::hash::Hash;
use std::sync::Arc;

/// Key/value store with cost-aware admission. Safe for concurrent use.
///
/// A rejected `set` means "not cached", never an error. `close` releases the
/// stored entries; afterwards every `get` misses and every `set` is rejected.
pub trait CompilationCache<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    /// Store `value` charging `cost` against the cache's budget. Returns
    /// whether the entry was admitted.
    fn set(&self, key: K, value: V, cost: u64) -> bool;

    fn close(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub rejections: u64,
    pub current_entries: usize,
    pub current_cost: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Build the backend for one cache: bounded when enabled, no-op otherwise
pub fn new_cache<K, V>(caching_enabled: bool, level: &LevelConfig) -> Arc<dyn CompilationCache<K, V>>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    if caching_enabled && level.enabled {
        Arc::new(BoundedCache::new(level.max_cost))
    } else {
        Arc::new(NoopCache::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_backend() {
        let level = LevelConfig {
            enabled: true,
            max_cost: 4,
        };
        let bounded: Arc<dyn CompilationCache<u64, u64>> = new_cache(true, &level);
        bounded.set(1, 1, 1);
        assert_eq!(bounded.get(&1), Some(1));

        let disabled: Arc<dyn CompilationCache<u64, u64>> = new_cache(false, &level);
        assert!(disabled.set(1, 1, 1));
        assert_eq!(disabled.get(&1), None);

        let level_off = LevelConfig {
            enabled: false,
            max_cost: 4,
        };
        let off: Arc<dyn CompilationCache<u64, u64>> = new_cache(true, &level_off);
        off.set(1, 1, 1);
        assert!(off.is_empty());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
