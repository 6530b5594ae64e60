// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Request body extraction
//!
//! Only `query` and `operationName` are decoded. `variables` is kept as raw
//! JSON and `extensions` is skipped, so a large variables payload is never
//! walked by the gateway.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Box<RawValue>>,
}

impl GraphQLRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            operation_name: None,
            variables: None,
        }
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_variables(mut self, variables: Option<Box<RawValue>>) -> Self {
        self.variables = variables;
        self
    }

    /// Decode a request body. A missing or empty query is rejected; an empty
    /// operation name is treated as absent.
    pub fn from_bytes(bytes: &[u8]) -> GatewayResult<Self> {
        let mut request: GraphQLRequest = serde_json::from_slice(bytes)?;
        match request.query.as_deref() {
            None => {
                return Err(GatewayError::InvalidRequest(
                    "request has no query".to_string(),
                ))
            }
            Some(q) if q.trim().is_empty() => {
                return Err(GatewayError::InvalidRequest("query is empty".to_string()))
            }
            Some(_) => {}
        }
        if request.operation_name.as_deref() == Some("") {
            request.operation_name = None;
        }
        Ok(request)
    }

    pub fn to_bytes(&self) -> GatewayResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn query(&self) -> &str {
        self.query.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_fields() {
        let body = br#"{"query":"{ a }","operationName":"Q","variables":{"id":[1,2,{"x":null}]},"extensions":{"k":1}}"#;
        let request = GraphQLRequest::from_bytes(body).unwrap();
        assert_eq!(request.query(), "{ a }");
        assert_eq!(request.operation_name.as_deref(), Some("Q"));
        assert_eq!(
            request.variables.as_ref().map(|v| v.get()),
            Some(r#"{"id":[1,2,{"x":null}]}"#)
        );
    }

    #[test]
    fn test_rejects_malformed_and_missing_query() {
        assert!(matches!(
            GraphQLRequest::from_bytes(b"{not json"),
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            GraphQLRequest::from_bytes(br#"{"variables":{}}"#),
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            GraphQLRequest::from_bytes(br#"{"query":"  "}"#),
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_empty_operation_name_is_absent() {
        let request =
            GraphQLRequest::from_bytes(br#"{"query":"{ a }","operationName":""}"#).unwrap();
        assert!(request.operation_name.is_none());
    }

    #[test]
    fn test_encode_for_replay() {
        let bytes = GraphQLRequest::new("{ a }")
            .with_operation_name("A")
            .to_bytes()
            .unwrap();
        let decoded = GraphQLRequest::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.query(), "{ a }");
        assert_eq!(decoded.operation_name.as_deref(), Some("A"));
        assert!(decoded.variables.is_none());
    }
}
