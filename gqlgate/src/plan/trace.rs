// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query plan tracing
//!
//! Captures the planning steps of a single compilation. Traced plans are
//! never cached, so a trace always belongs to the request that asked for it.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Trace information for query planning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTrace {
    pub steps: Vec<TraceStep>,
    pub total_duration: Duration,
}

/// Individual step in the planning process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub phase: PlanningPhase,
    pub description: String,
    pub duration: Duration,
}

/// Planning phases for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanningPhase {
    RootGrouping,
    EntitySplitting,
    FetchPrinting,
    CostEstimation,
}

/// Builder for creating plan traces
pub struct PlanTracer {
    steps: Vec<TraceStep>,
    start_time: Instant,
    current_step_start: Instant,
}

impl PlanTracer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            steps: Vec::new(),
            start_time: now,
            current_step_start: now,
        }
    }

    /// Record the step that ran since the previous one ended
    pub fn end_step(&mut self, phase: PlanningPhase, description: impl Into<String>) {
        let now = Instant::now();
        self.steps.push(TraceStep {
            phase,
            description: description.into(),
            duration: now.duration_since(self.current_step_start),
        });
        self.current_step_start = now;
    }

    pub fn finalize(self) -> PlanTrace {
        PlanTrace {
            steps: self.steps,
            total_duration: self.start_time.elapsed(),
        }
    }
}

impl Default for PlanTracer {
    fn default() -> Self {
        Self::new()
    }
}
