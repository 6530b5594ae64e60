// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Operation canonicalization
//!
//! Rewrites the selected operation into a form where formatting, argument
//! order, fragment structure and redundant selections no longer matter:
//!
//! - literal `@skip`/`@include` conditions are folded
//! - fragment spreads are inlined
//! - inline fragments that do not narrow the type are flattened
//! - selections with the same response key are merged
//! - fields, fragments, arguments, object fields, variables and directives are sorted
//!
//! The printed result is what gets hashed and compiled.

use serde_json::value::RawValue;
use std::collections::HashMap;
use std::sync::Arc;

use super::hasher::identity_hash;
use crate::ast::printer::print_selection;
use crate::ast::{
    parse_document, print_operation, Argument, Directive, Document, Field, FragmentDefinition,
    InlineFragment, Location, OperationDefinition, OperationKind, Selection, SelectionSet, Value,
    VariableDefinition, MAX_DEPTH,
};
use crate::error::{GatewayError, GatewayResult};
use crate::schema::{Schema, ValidationError};

/// An operation in canonical form together with its identity
#[derive(Debug, Clone)]
pub struct NormalizedOperation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub definition: OperationDefinition,
    pub canonical: String,
    pub hash: u64,
}

/// Per-request view: the request's own text and variables plus the shared
/// normalized operation (which may have come from the normalization cache)
#[derive(Debug, Clone)]
pub struct ParsedOperation {
    pub raw_query: String,
    pub operation_name: Option<String>,
    pub variables: Option<Box<RawValue>>,
    pub normalized: Arc<NormalizedOperation>,
}

impl ParsedOperation {
    pub fn kind(&self) -> OperationKind {
        self.normalized.kind
    }

    pub fn hash(&self) -> u64 {
        self.normalized.hash
    }

    pub fn canonical(&self) -> &str {
        &self.normalized.canonical
    }
}

/// Parse `query`, select the operation and canonicalize it against `schema`
pub fn normalize_operation(
    query: &str,
    operation_name: Option<&str>,
    schema: &Schema,
) -> GatewayResult<NormalizedOperation> {
    let document = parse_document(query)?;
    let operation = select_operation(&document, operation_name)?;

    let mut fragments = HashMap::new();
    for fragment in document.fragments() {
        if fragments.insert(fragment.name.as_str(), fragment).is_some() {
            return Err(validation(format!(
                "There can be only one fragment named \"{}\"",
                fragment.name
            )));
        }
    }

    let mut normalizer = Normalizer {
        schema,
        fragments,
        visiting: Vec::new(),
        depth: 0,
    };
    let root_type = schema.root_type(operation.kind);
    // Root mutation fields execute in document order
    let root_items = normalizer.collect(&operation.selection_set, root_type)?;
    let selection_set = SelectionSet {
        items: merge_and_sort(root_items, operation.kind != OperationKind::Mutation)?,
    };

    let mut variable_definitions: Vec<VariableDefinition> = operation
        .variable_definitions
        .iter()
        .map(|definition| VariableDefinition {
            name: definition.name.clone(),
            var_type: definition.var_type.clone(),
            default_value: definition.default_value.as_ref().map(canonical_value),
            directives: canonical_directives(&definition.directives),
        })
        .collect();
    variable_definitions.sort_by(|a, b| a.name.cmp(&b.name));

    let definition = OperationDefinition {
        kind: operation.kind,
        name: operation.name.clone(),
        variable_definitions,
        directives: canonical_directives(&operation.directives),
        selection_set,
        location: operation.location,
    };
    let canonical = print_operation(&definition);
    let hash = identity_hash(definition.name.as_deref(), &canonical);

    Ok(NormalizedOperation {
        kind: definition.kind,
        name: definition.name.clone(),
        definition,
        canonical,
        hash,
    })
}

fn select_operation<'d>(
    document: &'d Document,
    operation_name: Option<&str>,
) -> GatewayResult<&'d OperationDefinition> {
    match operation_name {
        Some(name) => document
            .operations()
            .find(|op| op.name.as_deref() == Some(name))
            .ok_or_else(|| GatewayError::OperationNotFound(name.to_string())),
        None => {
            let mut operations = document.operations();
            match (operations.next(), operations.next()) {
                (Some(operation), None) => Ok(operation),
                (None, _) => Err(GatewayError::InvalidRequest(
                    "document contains no operations".to_string(),
                )),
                (Some(_), Some(_)) => Err(GatewayError::AmbiguousOperation {
                    count: document.operations().count(),
                }),
            }
        }
    }
}

fn validation(message: String) -> GatewayError {
    GatewayError::Validation(ValidationError {
        message,
        path: Vec::new(),
    })
}

struct Normalizer<'a> {
    schema: &'a Schema,
    fragments: HashMap<&'a str, &'a FragmentDefinition>,
    /// Fragments currently being inlined, for cycle detection
    visiting: Vec<String>,
    /// Selection sets entered below the operation root
    depth: usize,
}

impl<'a> Normalizer<'a> {
    fn selection_set(
        &mut self,
        selection_set: &SelectionSet,
        parent: Option<&str>,
    ) -> GatewayResult<SelectionSet> {
        if selection_set.items.is_empty() {
            return Ok(SelectionSet::default());
        }
        // Fragment inlining can nest deeper than the document itself
        if self.depth >= MAX_DEPTH {
            return Err(validation(format!(
                "Selections nest deeper than the maximum depth of {}",
                MAX_DEPTH
            )));
        }

        self.depth += 1;
        let items = self.collect(selection_set, parent);
        self.depth -= 1;
        Ok(SelectionSet {
            items: merge_and_sort(items?, true)?,
        })
    }

    /// Normalize each selection without merging or ordering the result.
    /// `parent` is the type the selections apply to, when the schema knows it.
    fn collect(
        &mut self,
        selection_set: &SelectionSet,
        parent: Option<&str>,
    ) -> GatewayResult<Vec<Selection>> {
        let schema = self.schema;
        let mut items = Vec::with_capacity(selection_set.items.len());

        for selection in &selection_set.items {
            match selection {
                Selection::Field(field) => {
                    let Some(directives) = fold_conditions(&field.directives) else {
                        continue;
                    };
                    let field_type = parent.and_then(|p| schema.field_type(p, &field.name));
                    let children = self.selection_set(&field.selection_set, field_type)?;
                    items.push(Selection::Field(Field {
                        alias: field.alias.clone().filter(|alias| *alias != field.name),
                        name: field.name.clone(),
                        arguments: canonical_arguments(&field.arguments),
                        directives,
                        selection_set: children,
                        location: field.location,
                    }));
                }
                Selection::InlineFragment(inline) => {
                    let Some(directives) = fold_conditions(&inline.directives) else {
                        continue;
                    };
                    let type_condition = inline.type_condition.as_deref();
                    let children =
                        self.selection_set(&inline.selection_set, type_condition.or(parent))?;
                    push_fragment(
                        &mut items,
                        type_condition,
                        directives,
                        children,
                        parent,
                        inline.location,
                    );
                }
                Selection::FragmentSpread(spread) => {
                    let Some(directives) = fold_conditions(&spread.directives) else {
                        continue;
                    };
                    let fragment = self
                        .fragments
                        .get(spread.fragment_name.as_str())
                        .copied()
                        .ok_or_else(|| {
                            validation(format!("Unknown fragment \"{}\"", spread.fragment_name))
                        })?;
                    if self.visiting.contains(&fragment.name) {
                        return Err(validation(format!(
                            "Cannot spread fragment \"{}\" within itself",
                            fragment.name
                        )));
                    }

                    self.visiting.push(fragment.name.clone());
                    let children = self.selection_set(
                        &fragment.selection_set,
                        Some(fragment.type_condition.as_str()),
                    );
                    self.visiting.pop();

                    push_fragment(
                        &mut items,
                        Some(fragment.type_condition.as_str()),
                        directives,
                        children?,
                        parent,
                        spread.location,
                    );
                }
            }
        }

        Ok(items)
    }
}

/// Add an inline fragment, or its contents directly when it neither narrows
/// the type nor carries directives
fn push_fragment(
    items: &mut Vec<Selection>,
    type_condition: Option<&str>,
    directives: Vec<Directive>,
    children: SelectionSet,
    parent: Option<&str>,
    location: Location,
) {
    let narrows = match type_condition {
        None => false,
        Some(condition) => Some(condition) != parent,
    };
    if directives.is_empty() && !narrows {
        items.extend(children.items);
    } else {
        items.push(Selection::InlineFragment(InlineFragment {
            type_condition: type_condition.map(str::to_string),
            directives,
            selection_set: children,
            location,
        }));
    }
}

/// Fold literal `@skip`/`@include`. Returns `None` when the selection is
/// excluded, otherwise the remaining directives in canonical order.
fn fold_conditions(directives: &[Directive]) -> Option<Vec<Directive>> {
    let mut kept = Vec::with_capacity(directives.len());
    for directive in directives {
        let literal = match directive.argument("if") {
            Some(Value::Boolean(b)) => Some(*b),
            _ => None,
        };
        match (directive.name.as_str(), literal) {
            ("skip", Some(true)) | ("include", Some(false)) => return None,
            ("skip", Some(false)) | ("include", Some(true)) => {}
            _ => kept.push(canonical_directive(directive)),
        }
    }
    kept.sort_by(|a, b| a.name.cmp(&b.name));
    Some(kept)
}

fn canonical_directives(directives: &[Directive]) -> Vec<Directive> {
    let mut out: Vec<Directive> = directives.iter().map(canonical_directive).collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

fn canonical_directive(directive: &Directive) -> Directive {
    Directive {
        name: directive.name.clone(),
        arguments: canonical_arguments(&directive.arguments),
    }
}

fn canonical_arguments(arguments: &[Argument]) -> Vec<Argument> {
    let mut out: Vec<Argument> = arguments
        .iter()
        .map(|argument| Argument {
            name: argument.name.clone(),
            value: canonical_value(&argument.value),
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// Object fields are unordered in GraphQL; list order is significant
fn canonical_value(value: &Value) -> Value {
    match value {
        Value::List(items) => Value::List(items.iter().map(canonical_value).collect()),
        Value::Object(fields) => {
            let mut sorted: Vec<(String, Value)> = fields
                .iter()
                .map(|(name, v)| (name.clone(), canonical_value(v)))
                .collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(sorted)
        }
        other => other.clone(),
    }
}

/// Merge selections sharing a response key (or a type condition) and, when
/// `sort` is set, order the result. Children of merged selections are merged again.
fn merge_and_sort(items: Vec<Selection>, sort: bool) -> GatewayResult<Vec<Selection>> {
    let mut merged: Vec<Selection> = Vec::with_capacity(items.len());
    let mut touched: Vec<usize> = Vec::new();

    for selection in items {
        match selection {
            Selection::Field(field) => {
                let mut target = None;
                for (i, existing) in merged.iter().enumerate() {
                    let Selection::Field(existing) = existing else {
                        continue;
                    };
                    if existing.response_key() != field.response_key() {
                        continue;
                    }
                    if existing.name != field.name || existing.arguments != field.arguments {
                        return Err(validation(format!(
                            "Fields \"{}\" conflict because they have differing names or arguments",
                            field.response_key()
                        )));
                    }
                    if existing.directives == field.directives {
                        target = Some(i);
                        break;
                    }
                }
                match target {
                    Some(i) => {
                        if let Selection::Field(existing) = &mut merged[i] {
                            existing.selection_set.items.extend(field.selection_set.items);
                            touched.push(i);
                        }
                    }
                    None => merged.push(Selection::Field(field)),
                }
            }
            Selection::InlineFragment(inline) => {
                let target = merged.iter().position(|existing| {
                    matches!(existing, Selection::InlineFragment(e)
                        if e.type_condition == inline.type_condition
                            && e.directives == inline.directives)
                });
                match target {
                    Some(i) => {
                        if let Selection::InlineFragment(existing) = &mut merged[i] {
                            existing.selection_set.items.extend(inline.selection_set.items);
                            touched.push(i);
                        }
                    }
                    None => merged.push(Selection::InlineFragment(inline)),
                }
            }
            spread @ Selection::FragmentSpread(_) => merged.push(spread),
        }
    }

    touched.sort_unstable();
    touched.dedup();
    for i in touched {
        let children = match &mut merged[i] {
            Selection::Field(field) => &mut field.selection_set,
            Selection::InlineFragment(inline) => &mut inline.selection_set,
            Selection::FragmentSpread(_) => continue,
        };
        let items = std::mem::take(&mut children.items);
        children.items = merge_and_sort(items, true)?;
    }

    if sort {
        merged.sort_by_cached_key(sort_key);
    }
    Ok(merged)
}

fn sort_key(selection: &Selection) -> (u8, String, String) {
    let mut printed = String::new();
    print_selection(selection, &mut printed);
    match selection {
        Selection::Field(field) => (0, field.response_key().to_string(), printed),
        Selection::InlineFragment(inline) => (
            1,
            inline.type_condition.clone().unwrap_or_default(),
            printed,
        ),
        Selection::FragmentSpread(spread) => (2, spread.fragment_name.clone(), printed),
    }
}
