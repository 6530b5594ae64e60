// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Pipeline counters
//!
//! Plain atomics an external telemetry collaborator can read. Nothing here
//! formats or exports metrics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::cache_set::CacheSetStats;
use crate::warmup::WarmupProgressSnapshot;

#[derive(Debug, Default)]
pub struct CoordinatorStats {
    pub(crate) plan_hits: AtomicU64,
    pub(crate) plan_misses: AtomicU64,
    pub(crate) normalization_hits: AtomicU64,
    pub(crate) normalization_misses: AtomicU64,
    pub(crate) validation_hits: AtomicU64,
    pub(crate) validation_misses: AtomicU64,
    pub(crate) compilations: AtomicU64,
    pub(crate) compilation_errors: AtomicU64,
    pub(crate) deduplicated_waits: AtomicU64,
    pub(crate) bypassed_compilations: AtomicU64,
}

impl CoordinatorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counters(&self) -> PipelineCounters {
        PipelineCounters {
            plan_hits: self.plan_hits.load(Ordering::Relaxed),
            plan_misses: self.plan_misses.load(Ordering::Relaxed),
            normalization_hits: self.normalization_hits.load(Ordering::Relaxed),
            normalization_misses: self.normalization_misses.load(Ordering::Relaxed),
            validation_hits: self.validation_hits.load(Ordering::Relaxed),
            validation_misses: self.validation_misses.load(Ordering::Relaxed),
            compilations: self.compilations.load(Ordering::Relaxed),
            compilation_errors: self.compilation_errors.load(Ordering::Relaxed),
            deduplicated_waits: self.deduplicated_waits.load(Ordering::Relaxed),
            bypassed_compilations: self.bypassed_compilations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineCounters {
    pub plan_hits: u64,
    pub plan_misses: u64,
    pub normalization_hits: u64,
    pub normalization_misses: u64,
    pub validation_hits: u64,
    pub validation_misses: u64,
    pub compilations: u64,
    pub compilation_errors: u64,
    pub deduplicated_waits: u64,
    pub bypassed_compilations: u64,
}

impl PipelineCounters {
    pub fn plan_hit_rate(&self) -> f64 {
        let total = self.plan_hits + self.plan_misses;
        if total == 0 {
            0.0
        } else {
            self.plan_hits as f64 / total as f64
        }
    }
}

/// Everything a telemetry reader needs in one serialisable value
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatsSnapshot {
    pub counters: PipelineCounters,
    pub warmup: WarmupProgressSnapshot,
    pub in_flight_compilations: usize,
    pub cache_sets: Vec<CacheSetStats>,
}
