// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query planning
//!
//! The gateway treats plan compilation as a black box behind [`PlanCompiler`].
//! [`FederatedPlanner`] is the built-in implementation; [`DedupCompiler`]
//! ensures at most one compilation per operation identity is in flight.

pub mod dedup;
#[allow(clippy::module_inception)]
pub mod plan;
pub mod planner;
pub mod trace;

pub use dedup::{CompileOutcome, CompileRole, DedupCompiler};
pub use plan::{CompiledPlan, Execution, FetchNode};
pub use planner::FederatedPlanner;
pub use trace::{PlanTrace, PlanTracer, PlanningPhase, TraceStep};

use thiserror::Error;

use crate::normalize::NormalizedOperation;
use crate::schema::Schema;

/// Plan compilation errors. `Clone` so a single outcome can be handed to
/// every caller waiting on the same compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Planning error: {0}")]
    Planning(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Internal compiler error: {0}")]
    Internal(String),
}

/// Inputs to a compilation besides the operation and schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub tenant_key: String,
    pub schema_version: String,
    /// Record a `PlanTrace` of the planning steps
    pub trace: bool,
}

/// The plan-building routine. Must be safe to call concurrently for
/// different operations.
pub trait PlanCompiler: Send + Sync {
    fn compile(
        &self,
        operation: &NormalizedOperation,
        schema: &Schema,
        options: &CompileOptions,
    ) -> Result<CompiledPlan, CompileError>;
}
