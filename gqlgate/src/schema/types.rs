// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Supergraph schema description
//!
//! The schema is the merged view over every subgraph: each field records which
//! subgraph resolves it, which is all the planner needs to split an operation
//! into per-subgraph fetches. Maps are ordered so the serialised form (and
//! therefore the fingerprint) is stable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xxhash_rust::xxh64::xxh64;

use crate::ast::OperationKind;

const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Merged schema for one schema version (base graph or a feature-flag variant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Explicit version label; a content fingerprint is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default = "default_query_type")]
    pub query_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_type: Option<String>,

    #[serde(default)]
    pub types: BTreeMap<String, TypeDefinition>,
}

fn default_query_type() -> String {
    "Query".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Object,
    Interface,
    Union,
    Scalar,
    Enum,
    InputObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub kind: TypeKind,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldDefinition>,

    /// Implementations of an interface or members of a union
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_types: Vec<String>,

    /// Subgraph owning fields that do not name their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<String>,

    /// Entity key fields, used when another subgraph has to resolve a field of this type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Output type in SDL notation, e.g. `[User!]!`
    #[serde(rename = "type")]
    pub field_type: String,

    /// Argument name to SDL input type
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<String>,
}

impl FieldDefinition {
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            arguments: BTreeMap::new(),
            subgraph: None,
        }
    }

    pub fn owned_by(mut self, subgraph: impl Into<String>) -> Self {
        self.subgraph = Some(subgraph.into());
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, arg_type: impl Into<String>) -> Self {
        self.arguments.insert(name.into(), arg_type.into());
        self
    }

    /// Named type with list and non-null wrappers removed
    pub fn named_type(&self) -> &str {
        named_type(&self.field_type)
    }
}

impl TypeDefinition {
    fn with_kind(kind: TypeKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
            possible_types: Vec::new(),
            subgraph: None,
            keys: Vec::new(),
        }
    }

    pub fn object() -> Self {
        Self::with_kind(TypeKind::Object)
    }

    pub fn interface(possible_types: Vec<String>) -> Self {
        Self {
            possible_types,
            ..Self::with_kind(TypeKind::Interface)
        }
    }

    pub fn union(members: Vec<String>) -> Self {
        Self {
            possible_types: members,
            ..Self::with_kind(TypeKind::Union)
        }
    }

    pub fn scalar() -> Self {
        Self::with_kind(TypeKind::Scalar)
    }

    pub fn enumeration() -> Self {
        Self::with_kind(TypeKind::Enum)
    }

    pub fn owned_by(mut self, subgraph: impl Into<String>) -> Self {
        self.subgraph = Some(subgraph.into());
        self
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field: FieldDefinition) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Object | TypeKind::Interface | TypeKind::Union
        )
    }
}

/// Strip list and non-null wrappers from an SDL type
pub fn named_type(sdl_type: &str) -> &str {
    sdl_type.trim_matches(|c| c == '[' || c == ']' || c == '!')
}

impl Schema {
    pub fn new() -> Self {
        Self {
            version: None,
            query_type: default_query_type(),
            mutation_type: None,
            subscription_type: None,
            types: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_mutation_type(mut self, name: impl Into<String>) -> Self {
        self.mutation_type = Some(name.into());
        self
    }

    pub fn with_subscription_type(mut self, name: impl Into<String>) -> Self {
        self.subscription_type = Some(name.into());
        self
    }

    pub fn with_type(mut self, name: impl Into<String>, definition: TypeDefinition) -> Self {
        self.types.insert(name.into(), definition);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Version label: the declared version, or a fingerprint of the content
    pub fn version(&self) -> String {
        if let Some(version) = &self.version {
            return version.clone();
        }
        let serialized = serde_json::to_vec(self).unwrap_or_default();
        format!("{:016x}", xxh64(&serialized, 0))
    }

    pub fn root_type(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => Some(self.query_type.as_str()),
            OperationKind::Mutation => self.mutation_type.as_deref(),
            OperationKind::Subscription => self.subscription_type.as_deref(),
        }
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn field(&self, parent_type: &str, field_name: &str) -> Option<&FieldDefinition> {
        self.types.get(parent_type)?.fields.get(field_name)
    }

    /// Named return type of `parent_type.field_name`
    pub fn field_type(&self, parent_type: &str, field_name: &str) -> Option<&str> {
        self.field(parent_type, field_name).map(|f| f.named_type())
    }

    /// Subgraph that resolves `parent_type.field_name`, falling back to the type's owner
    pub fn field_owner(&self, parent_type: &str, field_name: &str) -> Option<&str> {
        let type_def = self.types.get(parent_type)?;
        type_def
            .fields
            .get(field_name)
            .and_then(|f| f.subgraph.as_deref())
            .or(type_def.subgraph.as_deref())
    }

    pub fn is_builtin_scalar(name: &str) -> bool {
        BUILTIN_SCALARS.contains(&name)
    }

    pub fn type_exists(&self, name: &str) -> bool {
        Self::is_builtin_scalar(name) || self.types.contains_key(name)
    }

    pub fn is_composite(&self, name: &str) -> bool {
        self.types
            .get(name)
            .map(|t| t.is_composite())
            .unwrap_or(false)
    }

    pub fn is_leaf(&self, name: &str) -> bool {
        Self::is_builtin_scalar(name)
            || self
                .types
                .get(name)
                .map(|t| matches!(t.kind, TypeKind::Scalar | TypeKind::Enum))
                .unwrap_or(false)
    }

    /// Concrete object types a value of `name` can be
    pub fn possible_types<'a>(&'a self, name: &'a str) -> Vec<&'a str> {
        match self.types.get(name) {
            Some(def) if def.kind == TypeKind::Object => vec![name],
            Some(def) => def.possible_types.iter().map(|s| s.as_str()).collect(),
            None => Vec::new(),
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}
