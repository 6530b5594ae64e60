// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for gqlgate
//!
//! Offline tools for inspecting canonical operation identities and for
//! dry-running cache warmup against a schema.

pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{Cli, Commands};
pub use handlers::{handle_normalize, handle_warm};
