// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache sets
//!
//! A cache set owns the plan, normalization and validation caches of one
//! schema version and moves through `Building -> Active -> Retiring -> Closed`.
//! Requests hold a [`CacheLease`] while they use a set; a retiring set closes
//! when its last lease is released, or when the grace period runs out.

use serde::Serialize;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{new_cache, CacheConfig, CacheStats, CompilationCache, CostPolicy};
use crate::error::{GatewayError, GatewayResult};
use crate::normalize::NormalizedOperation;
use crate::plan::CompiledPlan;
use crate::schema::{Schema, ValidationError};

pub type PlanCache = Arc<dyn CompilationCache<u64, Arc<CompiledPlan>>>;
pub type NormalizationCache = Arc<dyn CompilationCache<u64, Arc<NormalizedOperation>>>;
pub type ValidationCache = Arc<dyn CompilationCache<u64, Result<(), ValidationError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSetState {
    Building,
    Active,
    Retiring,
    Closed,
}

impl CacheSetState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CacheSetState::Building,
            1 => CacheSetState::Active,
            2 => CacheSetState::Retiring,
            _ => CacheSetState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            CacheSetState::Building => 0,
            CacheSetState::Active => 1,
            CacheSetState::Retiring => 2,
            CacheSetState::Closed => 3,
        }
    }
}

impl fmt::Display for CacheSetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheSetState::Building => "building",
            CacheSetState::Active => "active",
            CacheSetState::Retiring => "retiring",
            CacheSetState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// `(schema version, tenant key)`; the tenant key is empty for the base graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheSetKey {
    pub schema_version: String,
    pub tenant_key: String,
}

impl CacheSetKey {
    pub fn new(schema_version: impl Into<String>, tenant_key: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            tenant_key: tenant_key.into(),
        }
    }
}

impl fmt::Display for CacheSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tenant_key.is_empty() {
            write!(f, "<base>@{}", self.schema_version)
        } else {
            write!(f, "{}@{}", self.tenant_key, self.schema_version)
        }
    }
}

pub struct CacheSet {
    id: Uuid,
    key: CacheSetKey,
    schema: Arc<Schema>,
    plans: PlanCache,
    normalization: NormalizationCache,
    validation: ValidationCache,
    cost_policy: CostPolicy,
    state: AtomicU8,
    in_flight: AtomicUsize,
    created_at: Instant,
}

impl CacheSet {
    /// Build a set in the `Building` state. Fails only on invalid configuration.
    pub fn build(
        key: CacheSetKey,
        schema: Arc<Schema>,
        config: &CacheConfig,
    ) -> GatewayResult<Arc<Self>> {
        config.validate().map_err(GatewayError::CacheBackend)?;

        let set = Arc::new(Self {
            id: Uuid::new_v4(),
            plans: new_cache(config.enabled, &config.plan),
            normalization: new_cache(config.enabled, &config.normalization),
            validation: new_cache(config.enabled, &config.validation),
            cost_policy: config.cost_policy,
            key,
            schema,
            state: AtomicU8::new(CacheSetState::Building.as_u8()),
            in_flight: AtomicUsize::new(0),
            created_at: Instant::now(),
        });
        log::info!("Building cache set {} ({})", set.key, set.id);
        Ok(set)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &CacheSetKey {
        &self.key
    }

    pub fn tenant_key(&self) -> &str {
        &self.key.tenant_key
    }

    pub fn schema_version(&self) -> &str {
        &self.key.schema_version
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn plans(&self) -> &PlanCache {
        &self.plans
    }

    pub fn normalization(&self) -> &NormalizationCache {
        &self.normalization
    }

    pub fn validation(&self) -> &ValidationCache {
        &self.validation
    }

    pub fn state(&self) -> CacheSetState {
        CacheSetState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Cost charged for caching `plan`
    pub fn plan_cost(&self, plan: &CompiledPlan) -> u64 {
        match self.cost_policy {
            CostPolicy::Unit => 1,
            CostPolicy::EstimatedSize => plan.estimated_cost.max(1),
        }
    }

    fn transition(&self, from: CacheSetState, to: CacheSetState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// `Building -> Active`
    pub fn activate(&self) -> bool {
        let activated = self.transition(CacheSetState::Building, CacheSetState::Active);
        if activated {
            log::info!(
                "Activated cache set {} after {:?}",
                self.key,
                self.created_at.elapsed()
            );
        }
        activated
    }

    /// Register a request against this set. Returns `None` once the set is closed.
    pub fn lease(self: &Arc<Self>) -> Option<CacheLease> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let lease = CacheLease {
            set: Arc::clone(self),
        };
        if self.state() == CacheSetState::Closed {
            // Dropping the lease undoes the increment
            return None;
        }
        Some(lease)
    }

    /// Stop serving new requests. The set closes as soon as nothing holds a
    /// lease, and is force-closed once `grace` has passed.
    pub fn retire(self: &Arc<Self>, grace: Duration) {
        let retired = self.transition(CacheSetState::Active, CacheSetState::Retiring)
            || self.transition(CacheSetState::Building, CacheSetState::Retiring);
        if !retired {
            return;
        }

        let in_flight = self.in_flight();
        log::info!(
            "Retiring cache set {} with {} request(s) in flight",
            self.key,
            in_flight
        );
        if in_flight == 0 {
            self.close();
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let set = Arc::clone(self);
                handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    if set.state() != CacheSetState::Closed {
                        log::warn!(
                            "Force-closing cache set {} after {:?} grace period with {} request(s) still in flight",
                            set.key,
                            grace,
                            set.in_flight()
                        );
                        set.close();
                    }
                });
            }
            Err(_) => {
                log::debug!(
                    "No runtime to time the grace period of {}; closing on drain",
                    self.key
                );
            }
        }
    }

    /// Close every cache. Idempotent.
    pub fn close(&self) {
        let previous = self
            .state
            .swap(CacheSetState::Closed.as_u8(), Ordering::SeqCst);
        if previous == CacheSetState::Closed.as_u8() {
            return;
        }
        self.plans.close();
        self.normalization.close();
        self.validation.close();
        log::info!("Closed cache set {} ({})", self.key, self.id);
    }

    pub fn stats(&self) -> CacheSetStats {
        CacheSetStats {
            id: self.id.to_string(),
            key: self.key.clone(),
            state: self.state(),
            in_flight: self.in_flight(),
            plans: self.plans.stats(),
            normalization: self.normalization.stats(),
            validation: self.validation.stats(),
        }
    }
}

impl fmt::Debug for CacheSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSet")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Snapshot of one cache set
#[derive(Debug, Clone, Serialize)]
pub struct CacheSetStats {
    pub id: String,
    pub key: CacheSetKey,
    pub state: CacheSetState,
    pub in_flight: usize,
    pub plans: CacheStats,
    pub normalization: CacheStats,
    pub validation: CacheStats,
}

/// Keeps a cache set usable while a request runs against it
pub struct CacheLease {
    set: Arc<CacheSet>,
}

impl CacheLease {
    pub fn cache_set(&self) -> &Arc<CacheSet> {
        &self.set
    }
}

impl Deref for CacheLease {
    type Target = CacheSet;

    fn deref(&self) -> &CacheSet {
        &self.set
    }
}

impl Clone for CacheLease {
    fn clone(&self) -> Self {
        self.set.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            set: Arc::clone(&self.set),
        }
    }
}

impl Drop for CacheLease {
    fn drop(&mut self) {
        let previous = self.set.in_flight.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 && self.set.state() == CacheSetState::Retiring {
            self.set.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::OperationKind;
    use crate::plan::Execution;

    fn cache_set(config: &CacheConfig) -> Arc<CacheSet> {
        CacheSet::build(
            CacheSetKey::new("v1", "beta"),
            Arc::new(Schema::new()),
            config,
        )
        .unwrap()
    }

    fn plan() -> Arc<CompiledPlan> {
        Arc::new(CompiledPlan {
            operation_hash: 7,
            operation_name: None,
            kind: OperationKind::Query,
            schema_version: "v1".to_string(),
            tenant_key: "beta".to_string(),
            execution: Execution::Parallel,
            fetches: Vec::new(),
            estimated_cost: 4096,
            trace: None,
        })
    }

    #[test]
    fn test_lifecycle_without_requests() {
        let set = cache_set(&CacheConfig::default());
        assert_eq!(set.state(), CacheSetState::Building);
        assert!(set.activate());
        assert!(!set.activate());
        assert_eq!(set.state(), CacheSetState::Active);

        set.plans().set(7, plan(), 1);
        set.retire(Duration::from_secs(1));
        assert_eq!(set.state(), CacheSetState::Closed);
        assert!(set.plans().is_empty());
        assert!(set.lease().is_none());
    }

    #[test]
    fn test_retiring_set_closes_when_last_lease_drops() {
        let set = cache_set(&CacheConfig::default());
        set.activate();
        let first = set.lease().unwrap();
        let second = first.clone();
        assert_eq!(set.in_flight(), 2);

        set.retire(Duration::from_secs(60));
        assert_eq!(set.state(), CacheSetState::Retiring);

        // Retiring sets keep serving leased requests
        assert!(first.plans().set(7, plan(), 1));
        assert!(first.plans().get(&7).is_some());

        drop(first);
        assert_eq!(set.state(), CacheSetState::Retiring);
        drop(second);
        assert_eq!(set.state(), CacheSetState::Closed);
        assert_eq!(set.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_grace_period_forces_close() {
        let set = cache_set(&CacheConfig::default());
        set.activate();
        let lease = set.lease().unwrap();

        set.retire(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(set.state(), CacheSetState::Closed);

        // A lease outliving the grace period sees empty caches, never a failure
        assert!(lease.plans().get(&7).is_none());
        drop(lease);
        assert_eq!(set.in_flight(), 0);
    }

    #[test]
    fn test_invalid_config_is_a_backend_error() {
        let mut config = CacheConfig::default();
        config.plan.max_cost = 0;
        let err = CacheSet::build(CacheSetKey::new("v1", ""), Arc::new(Schema::new()), &config)
            .unwrap_err();
        assert!(matches!(err, GatewayError::CacheBackend(_)));
    }

    #[test]
    fn test_plan_cost_follows_policy() {
        let unit = cache_set(&CacheConfig::default());
        assert_eq!(unit.plan_cost(&plan()), 1);
        let sized = cache_set(&CacheConfig::memory_constrained());
        assert_eq!(sized.plan_cost(&plan()), 4096);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(CacheSetKey::new("abc", "").to_string(), "<base>@abc");
        assert_eq!(CacheSetKey::new("abc", "beta").to_string(), "beta@abc");
    }
}
