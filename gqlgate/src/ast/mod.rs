// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! AST subsystem: lexer, parser, AST nodes and canonical printing for GraphQL
//! executable documents

#[allow(clippy::module_inception)]
mod ast;
pub use ast::*;
pub mod lexer;
pub mod parser;
pub mod printer;

pub use parser::{parse_document, ParseError, MAX_DEPTH};
pub use printer::print_operation;
