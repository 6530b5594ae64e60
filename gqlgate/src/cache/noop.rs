// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache backend used when caching is disabled

use std::marker::PhantomData;

use super::CompilationCache;

/// Always misses; accepts and discards every write
pub struct NoopCache<K, V> {
    _marker: PhantomData<fn(K, V)>,
}

impl<K, V> NoopCache<K, V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K, V> Default for NoopCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CompilationCache<K, V> for NoopCache<K, V> {
    fn get(&self, _key: &K) -> Option<V> {
        None
    }

    fn set(&self, _key: K, _value: V, _cost: u64) -> bool {
        true
    }

    fn close(&self) {}

    fn len(&self) -> usize {
        0
    }
}
