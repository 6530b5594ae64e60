// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Gateway error types

use crate::ast::ParseError;
use crate::plan::CompileError;
use crate::schema::ValidationError;
use crate::warmup::WarmupSourceError;
use thiserror::Error;

/// Errors surfaced by the operation pipeline
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Syntax error: {0}")]
    Parse(#[from] ParseError),

    #[error("Document declares {count} operations; an operationName is required")]
    AmbiguousOperation { count: usize },

    #[error("Unknown operation named \"{0}\"")]
    OperationNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Compilation error: {0}")]
    Compilation(#[from] CompileError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache backend error: {0}")]
    CacheBackend(String),

    #[error("No cache set is routed for tenant \"{0}\"")]
    UnknownTenant(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Warmup source error: {0}")]
    WarmupSource(#[from] WarmupSourceError),
}

impl GatewayError {
    /// True when the request itself is at fault and retrying it unchanged cannot succeed
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::Parse(_)
                | GatewayError::AmbiguousOperation { .. }
                | GatewayError::OperationNotFound(_)
                | GatewayError::InvalidRequest(_)
                | GatewayError::Validation(_)
                | GatewayError::UnknownTenant(_)
        )
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::InvalidRequest(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(GatewayError::AmbiguousOperation { count: 2 }.is_client_error());
        assert!(GatewayError::InvalidRequest("x".into()).is_client_error());
        assert!(!GatewayError::Compilation(CompileError::Planning("x".into())).is_client_error());
        assert!(!GatewayError::NotReady("x".into()).is_client_error());
        assert!(!GatewayError::CacheBackend("x".into()).is_client_error());
    }
}
