// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Compiled query plans

use serde::{Deserialize, Serialize};

use super::trace::PlanTrace;
use crate::ast::OperationKind;

/// How the root fetches of a plan are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    /// Queries and subscriptions: root fetches are independent
    Parallel,
    /// Mutations: root fetches run in document order
    Sequential,
}

/// A request against one subgraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchNode {
    pub id: usize,
    pub subgraph: String,

    /// Entity type resolved by this fetch; `None` for root fetches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Response path the fetch result is merged at. `@` marks a list.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,

    /// Fetches whose results provide this fetch's representations
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<usize>,

    /// Operation text sent to the subgraph
    pub operation: String,

    /// Client variables forwarded to the subgraph
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
}

impl FetchNode {
    pub fn is_entity_fetch(&self) -> bool {
        self.entity_type.is_some()
    }
}

/// The cached artifact: everything needed to execute one operation against
/// one schema version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPlan {
    pub operation_hash: u64,
    pub operation_name: Option<String>,
    pub kind: OperationKind,
    pub schema_version: String,
    pub tenant_key: String,
    pub execution: Execution,
    pub fetches: Vec<FetchNode>,

    /// Estimated in-memory size in bytes
    pub estimated_cost: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<PlanTrace>,
}

impl CompiledPlan {
    pub fn root_fetches(&self) -> impl Iterator<Item = &FetchNode> {
        self.fetches.iter().filter(|f| !f.is_entity_fetch())
    }

    pub fn entity_fetches(&self) -> impl Iterator<Item = &FetchNode> {
        self.fetches.iter().filter(|f| f.is_entity_fetch())
    }

    pub fn subgraphs(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fetches.iter().map(|f| f.subgraph.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Rough size estimate, in the same spirit as the plan cache's byte budget
    pub fn estimate_size(&self) -> u64 {
        let base = std::mem::size_of::<Self>();
        let fetches: usize = self
            .fetches
            .iter()
            .map(|f| {
                std::mem::size_of::<FetchNode>()
                    + f.subgraph.len()
                    + f.operation.len()
                    + f.path.iter().map(|p| p.len() + 24).sum::<usize>()
                    + f.variables.iter().map(|v| v.len() + 24).sum::<usize>()
                    + f.depends_on.len() * 8
            })
            .sum();
        let trace = self
            .trace
            .as_ref()
            .map(|t| t.steps.len() * 100)
            .unwrap_or(0);
        let strings = self.schema_version.len()
            + self.tenant_key.len()
            + self.operation_name.as_ref().map(|n| n.len()).unwrap_or(0);

        (base + fetches + trace + strings) as u64
    }
}
