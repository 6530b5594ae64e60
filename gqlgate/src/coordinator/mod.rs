// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Operation Coordinator - the gateway's entry point for plan resolution
//!
//! Request handling code calls `OperationCoordinator::lookup`; the router's
//! configuration feed calls `apply_schema_update`.

pub mod operation_coordinator;
pub mod stats;

pub use operation_coordinator::{
    CacheHitFlags, LookupOptions, LookupOutcome, OperationCoordinator, SchemaUpdate,
    SchemaUpdateReport,
};
pub use stats::{CoordinatorStats, CoordinatorStatsSnapshot, PipelineCounters};
