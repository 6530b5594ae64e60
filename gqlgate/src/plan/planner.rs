// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Federated planner
//!
//! Splits a normalized operation into subgraph fetches:
//!
//! 1. Root fields are grouped by the subgraph that owns them. Query and
//!    subscription groups run in parallel; mutation fields keep document
//!    order and only consecutive fields of one subgraph share a fetch.
//! 2. Inside each fetch, a field owned by another subgraph is cut out and
//!    resolved by an `_entities` fetch against that subgraph, at the field's
//!    response path. The parent fetch selects `__typename` and the entity
//!    keys so representations can be built from its result.

use std::collections::{BTreeSet, VecDeque};

use super::plan::{CompiledPlan, Execution, FetchNode};
use super::trace::{PlanTracer, PlanningPhase};
use super::{CompileError, CompileOptions, PlanCompiler};
use crate::ast::{
    print_operation, Argument, Field, InlineFragment, Location, OperationDefinition,
    OperationKind, Selection, SelectionSet, TypeRef, Value, VariableDefinition,
};
use crate::normalize::NormalizedOperation;
use crate::schema::Schema;

/// Built-in `PlanCompiler` for schemas that record field ownership
#[derive(Debug, Clone, Default)]
pub struct FederatedPlanner;

impl FederatedPlanner {
    pub fn new() -> Self {
        Self
    }
}

/// Selections that must be fetched from another subgraph
struct EntityRequest {
    parent_fetch: usize,
    subgraph: String,
    type_name: String,
    path: Vec<String>,
    selections: Vec<Selection>,
}

struct PlanBuilder<'a> {
    schema: &'a Schema,
    operation: &'a NormalizedOperation,
    fetches: Vec<FetchNode>,
}

impl PlanCompiler for FederatedPlanner {
    fn compile(
        &self,
        operation: &NormalizedOperation,
        schema: &Schema,
        options: &CompileOptions,
    ) -> Result<CompiledPlan, CompileError> {
        let mut tracer = options.trace.then(PlanTracer::new);
        let root_type = schema.root_type(operation.kind).ok_or_else(|| {
            CompileError::Unsupported(format!("schema has no {} root type", operation.kind))
        })?;

        let groups = group_root_fields(operation, schema, root_type)?;
        if let Some(tracer) = tracer.as_mut() {
            tracer.end_step(
                PlanningPhase::RootGrouping,
                format!("{} root fetch group(s)", groups.len()),
            );
        }

        let mut builder = PlanBuilder {
            schema,
            operation,
            fetches: Vec::new(),
        };
        let mut pending = VecDeque::new();

        for (subgraph, selections) in groups {
            let id = builder.fetches.len();
            let mut deferred = Vec::new();
            let kept = builder.split(
                &SelectionSet { items: selections },
                root_type,
                &subgraph,
                &mut Vec::new(),
                id,
                &mut deferred,
            )?;
            let fetch = builder.root_fetch(id, subgraph, kept);
            builder.fetches.push(fetch);
            pending.extend(deferred);
        }

        while let Some(request) = pending.pop_front() {
            let id = builder.fetches.len();
            let mut deferred = Vec::new();
            let kept = builder.split(
                &SelectionSet {
                    items: request.selections,
                },
                &request.type_name,
                &request.subgraph,
                &mut request.path.clone(),
                id,
                &mut deferred,
            )?;
            let fetch = builder.entity_fetch(
                id,
                request.subgraph,
                request.type_name,
                request.path,
                request.parent_fetch,
                kept,
            );
            builder.fetches.push(fetch);
            pending.extend(deferred);
        }

        if let Some(tracer) = tracer.as_mut() {
            let entities = builder.fetches.iter().filter(|f| f.is_entity_fetch()).count();
            tracer.end_step(
                PlanningPhase::EntitySplitting,
                format!("{} entity fetch(es)", entities),
            );
        }

        let execution = match operation.kind {
            OperationKind::Mutation => Execution::Sequential,
            OperationKind::Query | OperationKind::Subscription => Execution::Parallel,
        };
        let mut plan = CompiledPlan {
            operation_hash: operation.hash,
            operation_name: operation.name.clone(),
            kind: operation.kind,
            schema_version: options.schema_version.clone(),
            tenant_key: options.tenant_key.clone(),
            execution,
            fetches: builder.fetches,
            estimated_cost: 0,
            trace: None,
        };
        plan.estimated_cost = plan.estimate_size();

        if let Some(mut tracer) = tracer {
            tracer.end_step(
                PlanningPhase::CostEstimation,
                format!("estimated size {} bytes", plan.estimated_cost),
            );
            plan.trace = Some(tracer.finalize());
            plan.estimated_cost = plan.estimate_size();
        }

        Ok(plan)
    }
}

fn group_root_fields(
    operation: &NormalizedOperation,
    schema: &Schema,
    root_type: &str,
) -> Result<Vec<(String, Vec<Selection>)>, CompileError> {
    let mut groups: Vec<(String, Vec<Selection>)> = Vec::new();

    for selection in &operation.definition.selection_set.items {
        let field = match selection {
            Selection::Field(field) => field,
            Selection::InlineFragment(_) => {
                return Err(CompileError::Unsupported(
                    "conditional fragments on the root type".to_string(),
                ))
            }
            Selection::FragmentSpread(spread) => {
                return Err(CompileError::Internal(format!(
                    "fragment spread \"{}\" reached the planner",
                    spread.fragment_name
                )))
            }
        };
        // Resolved by the gateway itself
        if field.name == "__typename" {
            continue;
        }

        let owner = schema.field_owner(root_type, &field.name).ok_or_else(|| {
            CompileError::Planning(format!(
                "no subgraph resolves field \"{}.{}\"",
                root_type, field.name
            ))
        })?;

        let target = match operation.kind {
            OperationKind::Mutation => groups
                .last_mut()
                .filter(|(subgraph, _)| subgraph.as_str() == owner),
            OperationKind::Query | OperationKind::Subscription => {
                groups.iter_mut().find(|(subgraph, _)| subgraph.as_str() == owner)
            }
        };
        match target {
            Some((_, selections)) => selections.push(selection.clone()),
            None => groups.push((owner.to_string(), vec![selection.clone()])),
        }
    }

    Ok(groups)
}

impl<'a> PlanBuilder<'a> {
    /// Keep the selections `subgraph` can resolve and queue the rest as
    /// entity requests depending on fetch `fetch_id`
    fn split(
        &self,
        selection_set: &SelectionSet,
        parent_type: &str,
        subgraph: &str,
        path: &mut Vec<String>,
        fetch_id: usize,
        deferred: &mut Vec<EntityRequest>,
    ) -> Result<SelectionSet, CompileError> {
        let schema = self.schema;
        let keys: &[String] = schema
            .get_type(parent_type)
            .map(|t| t.keys.as_slice())
            .unwrap_or_default();
        let mut kept = Vec::with_capacity(selection_set.items.len());
        let mut moved = false;

        for selection in &selection_set.items {
            match selection {
                Selection::Field(field) => {
                    if field.name == "__typename" {
                        kept.push(selection.clone());
                        continue;
                    }
                    let definition = schema.field(parent_type, &field.name).ok_or_else(|| {
                        CompileError::Planning(format!(
                            "unknown field \"{}.{}\"",
                            parent_type, field.name
                        ))
                    })?;

                    let owner = if keys.contains(&field.name) {
                        subgraph
                    } else {
                        schema
                            .field_owner(parent_type, &field.name)
                            .unwrap_or(subgraph)
                    };
                    if owner != subgraph {
                        moved = true;
                        queue_entity_request(
                            deferred,
                            EntityRequest {
                                parent_fetch: fetch_id,
                                subgraph: owner.to_string(),
                                type_name: parent_type.to_string(),
                                path: path.clone(),
                                selections: vec![selection.clone()],
                            },
                        );
                        continue;
                    }

                    if field.selection_set.is_empty() {
                        kept.push(selection.clone());
                        continue;
                    }

                    let is_list = definition.field_type.contains('[');
                    path.push(field.response_key().to_string());
                    if is_list {
                        path.push("@".to_string());
                    }
                    let children = self.split(
                        &field.selection_set,
                        definition.named_type(),
                        subgraph,
                        path,
                        fetch_id,
                        deferred,
                    );
                    if is_list {
                        path.pop();
                    }
                    path.pop();

                    kept.push(Selection::Field(Field {
                        selection_set: children?,
                        ..field.clone()
                    }));
                }
                Selection::InlineFragment(inline) => {
                    let condition = inline.type_condition.as_deref().unwrap_or(parent_type);
                    let children = self.split(
                        &inline.selection_set,
                        condition,
                        subgraph,
                        path,
                        fetch_id,
                        deferred,
                    )?;
                    if !children.is_empty() {
                        kept.push(Selection::InlineFragment(InlineFragment {
                            selection_set: children,
                            ..inline.clone()
                        }));
                    }
                }
                Selection::FragmentSpread(spread) => {
                    return Err(CompileError::Internal(format!(
                        "fragment spread \"{}\" reached the planner",
                        spread.fragment_name
                    )))
                }
            }
        }

        if moved {
            if keys.is_empty() {
                return Err(CompileError::Planning(format!(
                    "type \"{}\" declares no key fields, so subgraph \"{}\" cannot hand it to another subgraph",
                    parent_type, subgraph
                )));
            }
            for key in std::iter::once("__typename").chain(keys.iter().map(String::as_str)) {
                let present = kept.iter().any(|s| {
                    matches!(s, Selection::Field(f) if f.name == key && f.alias.is_none())
                });
                if !present {
                    kept.push(Selection::Field(leaf_field(key)));
                }
            }
        }

        Ok(SelectionSet { items: kept })
    }

    fn root_fetch(&self, id: usize, subgraph: String, selection_set: SelectionSet) -> FetchNode {
        let variables = used_variables(&selection_set);
        let definition = OperationDefinition {
            kind: self.operation.kind,
            name: self.fetch_name(&subgraph, id),
            variable_definitions: self.forwarded_definitions(&variables),
            directives: Vec::new(),
            selection_set,
            location: Location::default(),
        };
        FetchNode {
            id,
            subgraph,
            entity_type: None,
            path: Vec::new(),
            depends_on: Vec::new(),
            operation: print_operation(&definition),
            variables,
        }
    }

    fn entity_fetch(
        &self,
        id: usize,
        subgraph: String,
        type_name: String,
        path: Vec<String>,
        parent_fetch: usize,
        selection_set: SelectionSet,
    ) -> FetchNode {
        let variables = used_variables(&selection_set);
        let mut variable_definitions = vec![VariableDefinition {
            name: "representations".to_string(),
            var_type: TypeRef::NonNull(Box::new(TypeRef::List(Box::new(TypeRef::NonNull(
                Box::new(TypeRef::Named("_Any".to_string())),
            ))))),
            default_value: None,
            directives: Vec::new(),
        }];
        variable_definitions.extend(self.forwarded_definitions(&variables));

        let entities = Field {
            alias: None,
            name: "_entities".to_string(),
            arguments: vec![Argument {
                name: "representations".to_string(),
                value: Value::Variable("representations".to_string()),
            }],
            directives: Vec::new(),
            selection_set: SelectionSet {
                items: vec![Selection::InlineFragment(InlineFragment {
                    type_condition: Some(type_name.clone()),
                    directives: Vec::new(),
                    selection_set,
                    location: Location::default(),
                })],
            },
            location: Location::default(),
        };
        let definition = OperationDefinition {
            kind: OperationKind::Query,
            name: self.fetch_name(&subgraph, id),
            variable_definitions,
            directives: Vec::new(),
            selection_set: SelectionSet {
                items: vec![Selection::Field(entities)],
            },
            location: Location::default(),
        };

        FetchNode {
            id,
            subgraph,
            entity_type: Some(type_name),
            path,
            depends_on: vec![parent_fetch],
            operation: print_operation(&definition),
            variables,
        }
    }

    fn fetch_name(&self, subgraph: &str, id: usize) -> Option<String> {
        self.operation
            .name
            .as_ref()
            .map(|name| format!("{}__{}__{}", name, subgraph, id))
    }

    fn forwarded_definitions(&self, variables: &[String]) -> Vec<VariableDefinition> {
        self.operation
            .definition
            .variable_definitions
            .iter()
            .filter(|d| variables.contains(&d.name))
            .cloned()
            .collect()
    }
}

fn queue_entity_request(deferred: &mut Vec<EntityRequest>, request: EntityRequest) {
    let existing = deferred.iter_mut().find(|r| {
        r.parent_fetch == request.parent_fetch
            && r.subgraph == request.subgraph
            && r.type_name == request.type_name
            && r.path == request.path
    });
    match existing {
        Some(existing) => existing.selections.extend(request.selections),
        None => deferred.push(request),
    }
}

fn leaf_field(name: &str) -> Field {
    Field {
        alias: None,
        name: name.to_string(),
        arguments: Vec::new(),
        directives: Vec::new(),
        selection_set: SelectionSet::default(),
        location: Location::default(),
    }
}

fn used_variables(selection_set: &SelectionSet) -> Vec<String> {
    fn walk<'s>(selection_set: &'s SelectionSet, out: &mut Vec<&'s str>) {
        for selection in &selection_set.items {
            let (arguments, directives, children) = match selection {
                Selection::Field(f) => (f.arguments.as_slice(), &f.directives, &f.selection_set),
                Selection::InlineFragment(i) => (&[][..], &i.directives, &i.selection_set),
                Selection::FragmentSpread(_) => continue,
            };
            for argument in arguments
                .iter()
                .chain(directives.iter().flat_map(|d| d.arguments.iter()))
            {
                argument.value.collect_variables(out);
            }
            walk(children, out);
        }
    }

    let mut names = Vec::new();
    walk(selection_set, &mut names);
    names
        .into_iter()
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
