// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema-aware validation of normalized operations
//!
//! Runs after normalization, so fragment spreads have already been inlined and
//! literal `@skip`/`@include` folded away. The outcome depends only on the
//! canonical operation and the schema version, which is what lets it be cached
//! per identity hash.

use std::collections::HashSet;
use thiserror::Error;

use super::types::{named_type, Schema};
use crate::ast::{Directive, OperationDefinition, OperationKind, Selection, SelectionSet};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", path_suffix(.path))]
pub struct ValidationError {
    pub message: String,
    /// Response path to the offending selection, root first
    pub path: Vec<String>,
}

fn path_suffix(path: &[String]) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" (at {})", path.join("."))
    }
}

impl ValidationError {
    fn new(message: impl Into<String>, path: &[String]) -> Self {
        Self {
            message: message.into(),
            path: path.to_vec(),
        }
    }
}

struct Validator<'a> {
    schema: &'a Schema,
    declared_variables: HashSet<&'a str>,
    path: Vec<String>,
}

/// Validate a normalized operation against `schema`
pub fn validate_operation(
    operation: &OperationDefinition,
    schema: &Schema,
) -> Result<(), ValidationError> {
    let root_type = schema.root_type(operation.kind).ok_or_else(|| {
        ValidationError::new(
            format!("Schema does not support {} operations", operation.kind),
            &[],
        )
    })?;
    if !schema.is_composite(root_type) {
        return Err(ValidationError::new(
            format!("Root type \"{}\" is not defined", root_type),
            &[],
        ));
    }

    let mut declared_variables = HashSet::new();
    for definition in &operation.variable_definitions {
        if !declared_variables.insert(definition.name.as_str()) {
            return Err(ValidationError::new(
                format!("There can be only one variable named \"${}\"", definition.name),
                &[],
            ));
        }
        let input_type = definition.var_type.named_type();
        if !schema.type_exists(input_type) {
            return Err(ValidationError::new(
                format!("Unknown type \"{}\"", input_type),
                &[],
            ));
        }
    }

    if operation.kind == OperationKind::Subscription {
        let root_fields = operation
            .selection_set
            .items
            .iter()
            .filter(|s| !matches!(s, Selection::Field(f) if f.name == "__typename"))
            .count();
        if root_fields != 1 {
            return Err(ValidationError::new(
                "Subscription operations must select exactly one top level field",
                &[],
            ));
        }
    }

    let mut validator = Validator {
        schema,
        declared_variables,
        path: Vec::new(),
    };
    validator.check_directives(&operation.directives)?;
    validator.check_selection_set(&operation.selection_set, root_type)
}

impl<'a> Validator<'a> {
    fn error(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::new(message, &self.path)
    }

    fn check_selection_set(
        &mut self,
        selection_set: &SelectionSet,
        parent_type: &str,
    ) -> Result<(), ValidationError> {
        for selection in &selection_set.items {
            match selection {
                Selection::Field(field) => {
                    self.path.push(field.response_key().to_string());
                    let result = self.check_field(field, parent_type);
                    self.path.pop();
                    result?;
                }
                Selection::InlineFragment(inline) => {
                    self.check_directives(&inline.directives)?;
                    let fragment_type = match &inline.type_condition {
                        Some(condition) => {
                            self.check_type_condition(condition, parent_type)?;
                            condition.as_str()
                        }
                        None => parent_type,
                    };
                    self.check_selection_set(&inline.selection_set, fragment_type)?;
                }
                Selection::FragmentSpread(spread) => {
                    return Err(self.error(format!(
                        "Fragment spread \"{}\" was not inlined",
                        spread.fragment_name
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_field(
        &mut self,
        field: &crate::ast::Field,
        parent_type: &str,
    ) -> Result<(), ValidationError> {
        self.check_directives(&field.directives)?;

        if field.name == "__typename" {
            if !field.arguments.is_empty() || !field.selection_set.is_empty() {
                return Err(self.error("\"__typename\" takes no arguments or sub-selections"));
            }
            return Ok(());
        }

        let schema = self.schema;
        let definition = schema.field(parent_type, &field.name).ok_or_else(|| {
            self.error(format!(
                "Cannot query field \"{}\" on type \"{}\"",
                field.name, parent_type
            ))
        })?;

        for argument in &field.arguments {
            if !definition.arguments.contains_key(&argument.name) {
                return Err(self.error(format!(
                    "Unknown argument \"{}\" on field \"{}.{}\"",
                    argument.name, parent_type, field.name
                )));
            }
            self.check_variables(&argument.value)?;
        }
        for (arg_name, arg_type) in &definition.arguments {
            let required = arg_type.ends_with('!');
            if required && !field.arguments.iter().any(|a| &a.name == arg_name) {
                return Err(self.error(format!(
                    "Field \"{}.{}\" argument \"{}\" of type \"{}\" is required",
                    parent_type, field.name, arg_name, arg_type
                )));
            }
        }

        let return_type = named_type(&definition.field_type);
        if schema.is_leaf(return_type) {
            if !field.selection_set.is_empty() {
                return Err(self.error(format!(
                    "Field \"{}\" must not have a selection since type \"{}\" has no subfields",
                    field.name, return_type
                )));
            }
            Ok(())
        } else if schema.is_composite(return_type) {
            if field.selection_set.is_empty() {
                return Err(self.error(format!(
                    "Field \"{}\" of type \"{}\" must have a selection of subfields",
                    field.name, return_type
                )));
            }
            self.check_selection_set(&field.selection_set, return_type)
        } else {
            Err(self.error(format!("Unknown type \"{}\"", return_type)))
        }
    }

    fn check_type_condition(
        &self,
        condition: &str,
        parent_type: &str,
    ) -> Result<(), ValidationError> {
        if !self.schema.is_composite(condition) {
            return Err(self.error(format!(
                "Fragment cannot condition on non composite type \"{}\"",
                condition
            )));
        }
        let parent_possible = self.schema.possible_types(parent_type);
        let overlaps = self
            .schema
            .possible_types(condition)
            .iter()
            .any(|t| parent_possible.contains(t));
        if !overlaps {
            return Err(self.error(format!(
                "Fragment cannot be spread here as objects of type \"{}\" can never be of type \"{}\"",
                parent_type, condition
            )));
        }
        Ok(())
    }

    fn check_directives(&self, directives: &[Directive]) -> Result<(), ValidationError> {
        for directive in directives {
            for argument in &directive.arguments {
                self.check_variables(&argument.value)?;
            }
        }
        Ok(())
    }

    fn check_variables(&self, value: &crate::ast::Value) -> Result<(), ValidationError> {
        let mut referenced = Vec::new();
        value.collect_variables(&mut referenced);
        match referenced
            .into_iter()
            .find(|name| !self.declared_variables.contains(name))
        {
            Some(name) => Err(self.error(format!("Variable \"${}\" is not defined", name))),
            None => Ok(()),
        }
    }
}
