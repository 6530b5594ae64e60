// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Request normalization: body extraction, canonicalization and identity hashing

pub mod hasher;
pub mod normalizer;
pub mod request;

pub use hasher::{identity_hash, request_key};
pub use normalizer::{normalize_operation, NormalizedOperation, ParsedOperation};
pub use request::GraphQLRequest;
