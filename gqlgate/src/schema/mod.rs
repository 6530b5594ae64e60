// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Merged (supergraph) schema model and operation validation

pub mod types;
pub mod validator;

pub use types::{FieldDefinition, Schema, TypeDefinition, TypeKind};
pub use validator::{validate_operation, ValidationError};
