// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Warm query tracker
//!
//! Remembers recently compiled operations per tenant key in fixed-size rings.
//! Once a ring is full each insert overwrites the oldest slot. The ring is a
//! sample of what is hot, not a history: duplicates are kept and nothing
//! records whether an overwritten entry was ever replayed.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

struct Ring {
    slots: Vec<String>,
    next: usize,
    capacity: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.min(64)),
            next: 0,
            capacity,
        }
    }

    fn push(&mut self, query: &str) {
        if self.slots.len() < self.capacity {
            self.slots.push(query.to_string());
        } else {
            self.slots[self.next] = query.to_string();
        }
        self.next = (self.next + 1) % self.capacity;
    }

    /// Oldest first, duplicates removed
    fn snapshot(&self) -> Vec<String> {
        let start = if self.slots.len() < self.capacity {
            0
        } else {
            self.next
        };
        let mut seen = std::collections::HashSet::new();
        let len = self.slots.len();
        (0..len)
            .map(|i| &self.slots[(start + i) % len])
            .filter(|q| seen.insert(q.as_str()))
            .cloned()
            .collect()
    }
}

pub struct WarmQueryTracker {
    capacity: usize,
    rings: RwLock<HashMap<String, Arc<Mutex<Ring>>>>,
}

impl WarmQueryTracker {
    /// Tracker keeping at most `capacity` entries per tenant key. A capacity
    /// of zero disables recording.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rings: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, tenant_key: &str, query: &str) {
        if self.capacity == 0 {
            return;
        }

        let existing = self.rings.read().get(tenant_key).cloned();
        let ring = match existing {
            Some(ring) => ring,
            None => {
                let mut rings = self.rings.write();
                Arc::clone(
                    rings
                        .entry(tenant_key.to_string())
                        .or_insert_with(|| Arc::new(Mutex::new(Ring::new(self.capacity)))),
                )
            }
        };
        ring.lock().push(query);
    }

    /// Distinct recorded queries for `tenant_key`, oldest first. `None` if
    /// nothing was ever recorded for it.
    pub fn snapshot(&self, tenant_key: &str) -> Option<Vec<String>> {
        let ring = self.rings.read().get(tenant_key).cloned()?;
        let snapshot = ring.lock().snapshot();
        Some(snapshot)
    }

    pub fn len(&self, tenant_key: &str) -> usize {
        self.rings
            .read()
            .get(tenant_key)
            .map(|ring| ring.lock().slots.len())
            .unwrap_or(0)
    }

    pub fn tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = self.rings.read().keys().cloned().collect();
        tenants.sort();
        tenants
    }

    /// Delete the rings of tenant keys not in `active`. The base graph's ring
    /// (empty tenant key) is always kept. Returns the removed tenant keys.
    pub fn retain_tenants(&self, active: &[String]) -> Vec<String> {
        let mut removed = Vec::new();
        self.rings.write().retain(|tenant_key, _| {
            let keep = tenant_key.is_empty() || active.contains(tenant_key);
            if !keep {
                removed.push(tenant_key.clone());
            }
            keep
        });
        for tenant_key in &removed {
            log::debug!("Removed warm query ring for tenant '{}'", tenant_key);
        }
        removed.sort();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_never_exceeds_capacity() {
        let tracker = WarmQueryTracker::new(2);
        tracker.record("", "{ a }");
        tracker.record("", "{ b }");
        tracker.record("", "{ a }");

        assert_eq!(tracker.len(""), 2);
        let snapshot = tracker.snapshot("").unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&"{ b }".to_string()));
    }

    #[test]
    fn test_overwrites_oldest() {
        let tracker = WarmQueryTracker::new(3);
        for q in ["1", "2", "3", "4", "5"] {
            tracker.record("beta", q);
        }
        assert_eq!(tracker.snapshot("beta").unwrap(), vec!["3", "4", "5"]);
    }

    #[test]
    fn test_snapshot_dedups() {
        let tracker = WarmQueryTracker::new(4);
        for q in ["x", "y", "x", "x"] {
            tracker.record("", q);
        }
        assert_eq!(tracker.len(""), 4);
        assert_eq!(tracker.snapshot("").unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_tenants_are_independent() {
        let tracker = WarmQueryTracker::new(2);
        tracker.record("", "{ base }");
        tracker.record("beta", "{ flag }");
        assert_eq!(tracker.snapshot("").unwrap(), vec!["{ base }"]);
        assert_eq!(tracker.snapshot("beta").unwrap(), vec!["{ flag }"]);
        assert!(tracker.snapshot("gamma").is_none());
    }

    #[test]
    fn test_retain_keeps_base_graph() {
        let tracker = WarmQueryTracker::new(2);
        tracker.record("", "{ a }");
        tracker.record("beta", "{ a }");
        tracker.record("gamma", "{ a }");

        let removed = tracker.retain_tenants(&["gamma".to_string()]);
        assert_eq!(removed, vec!["beta".to_string()]);
        assert_eq!(tracker.tenants(), vec!["".to_string(), "gamma".to_string()]);

        tracker.retain_tenants(&[]);
        assert_eq!(tracker.tenants(), vec!["".to_string()]);
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let tracker = WarmQueryTracker::new(0);
        tracker.record("", "{ a }");
        assert!(tracker.snapshot("").is_none());
    }

    #[test]
    fn test_concurrent_recording() {
        let tracker = Arc::new(WarmQueryTracker::new(16));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        tracker.record(if t % 2 == 0 { "" } else { "beta" }, &format!("{{ f{} }}", i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.len(""), 16);
        assert_eq!(tracker.len("beta"), 16);
    }
}
