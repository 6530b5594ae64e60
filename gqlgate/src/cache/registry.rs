// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Routing table from tenant key to the active cache set

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::cache_set::{CacheLease, CacheSet};

/// Read-mostly map of tenant key to cache set. Requests take leases under
/// the read lock, so once `swap` returns no new request can reach a
/// replaced set and its lease count only goes down.
#[derive(Default)]
pub struct CacheRegistry {
    sets: RwLock<HashMap<String, Arc<CacheSet>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease the set routed for `tenant_key`
    pub fn route(&self, tenant_key: &str) -> Option<CacheLease> {
        let sets = self.sets.read();
        sets.get(tenant_key).and_then(|set| set.lease())
    }

    pub fn get(&self, tenant_key: &str) -> Option<Arc<CacheSet>> {
        self.sets.read().get(tenant_key).cloned()
    }

    pub fn tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = self.sets.read().keys().cloned().collect();
        tenants.sort();
        tenants
    }

    pub fn snapshot(&self) -> Vec<Arc<CacheSet>> {
        let mut sets: Vec<Arc<CacheSet>> = self.sets.read().values().cloned().collect();
        sets.sort_by(|a, b| a.tenant_key().cmp(b.tenant_key()));
        sets
    }

    pub fn len(&self) -> usize {
        self.sets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.read().is_empty()
    }

    /// Route `installed` sets (activating them) and unroute `removed` tenant
    /// keys in one write. Returns the sets that are no longer routed; the
    /// caller retires them.
    pub fn swap(&self, installed: Vec<Arc<CacheSet>>, removed: &[String]) -> Vec<Arc<CacheSet>> {
        let mut superseded = Vec::new();
        let mut sets = self.sets.write();

        for set in installed {
            set.activate();
            if let Some(previous) = sets.insert(set.tenant_key().to_string(), set) {
                superseded.push(previous);
            }
        }
        for tenant_key in removed {
            if let Some(previous) = sets.remove(tenant_key) {
                superseded.push(previous);
            }
        }

        superseded
    }

    /// Unroute every set
    pub fn drain(&self) -> Vec<Arc<CacheSet>> {
        self.sets.write().drain().map(|(_, set)| set).collect()
    }
}
