// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! gqlgate - operation compilation and plan caching for a federated GraphQL gateway
//!
//! # Features
//!
//! - **Canonical identity**: queries that differ only in formatting, argument
//!   order or fragment structure share one 64-bit identity hash
//! - **Single compilation**: concurrent requests for the same uncached
//!   operation wait on one compilation
//! - **Tenant scoping**: the base graph and every feature flag get their own
//!   cache set, swapped and retired as the schema changes
//! - **Warmup**: new cache sets are precompiled from a manifest, a directory
//!   of operations or the operations recently seen by this process
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use gqlgate::{FederatedPlanner, GatewayConfig, OperationCoordinator, Schema, SchemaUpdate};
//!
//! # async fn run(schema: Schema) -> gqlgate::GatewayResult<()> {
//! let coordinator =
//!     OperationCoordinator::new(GatewayConfig::default(), Arc::new(FederatedPlanner::new()))?;
//! coordinator.apply_schema_update(SchemaUpdate::new(schema)).await?;
//!
//! let outcome = coordinator.lookup("", br#"{"query":"{ me { id } }"}"#).await?;
//! println!("{} fetch(es), plan cache hit: {}", outcome.plan.fetches.len(), outcome.hits.plan);
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod normalize;
pub mod plan;
pub mod schema;
pub mod warmup;

pub use cache::{CacheConfig, CompilationCache, CostPolicy, LevelConfig};
pub use config::{GatewayConfig, WarmupConfig, WarmupSourceConfig};
pub use coordinator::{
    CacheHitFlags, LookupOptions, LookupOutcome, OperationCoordinator, SchemaUpdate,
    SchemaUpdateReport,
};
pub use error::{GatewayError, GatewayResult};
pub use normalize::{normalize_operation, GraphQLRequest, NormalizedOperation, ParsedOperation};
pub use plan::{CompileError, CompileOptions, CompiledPlan, FederatedPlanner, PlanCompiler};
pub use schema::Schema;
pub use warmup::{WarmQueryTracker, WarmupOperation, WarmupSource};

/// gqlgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// gqlgate crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
