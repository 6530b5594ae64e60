// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Warmup sources
//!
//! A source answers, per tenant key, with a batch of operations to
//! precompile (`Some`), or with `None` when it has nothing for that tenant
//! and the next source should be asked. An empty batch means "nothing to
//! warm" and ends the search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::tracker::WarmQueryTracker;
use crate::normalize::GraphQLRequest;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WarmupSourceError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Fetch error: {0}")]
    Fetch(String),
}

impl From<std::io::Error> for WarmupSourceError {
    fn from(err: std::io::Error) -> Self {
        WarmupSourceError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for WarmupSourceError {
    fn from(err: serde_json::Error) -> Self {
        WarmupSourceError::Decode(err.to_string())
    }
}

/// One operation to precompile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmupOperation {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

impl WarmupOperation {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: None,
        }
    }

    /// Encode as a request body, exactly as a client would send it
    pub fn to_request_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let variables = self
            .variables
            .as_ref()
            .map(serde_json::value::to_raw_value)
            .transpose()?;
        let mut request = GraphQLRequest::new(self.query.clone()).with_variables(variables);
        request.operation_name = self.operation_name.clone();
        serde_json::to_vec(&request)
    }
}

#[async_trait]
pub trait WarmupSource: Send + Sync {
    fn name(&self) -> &str;

    async fn load_items(
        &self,
        tenant_key: &str,
    ) -> Result<Option<Vec<WarmupOperation>>, WarmupSourceError>;
}

/// Operations stored as files under a directory. The base graph reads the
/// directory itself; a feature flag reads the sub-directory named after it.
///
/// `.graphql` / `.gql` files hold one document each. `.json` files hold a
/// single operation object or an array of them. Other files are ignored.
pub struct FilesystemSource {
    root: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OperationFile {
    One(WarmupOperation),
    Many(Vec<WarmupOperation>),
}

impl FilesystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tenant_dir(&self, tenant_key: &str) -> PathBuf {
        if tenant_key.is_empty() {
            self.root.clone()
        } else {
            self.root.join(tenant_key)
        }
    }
}

#[async_trait]
impl WarmupSource for FilesystemSource {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn load_items(
        &self,
        tenant_key: &str,
    ) -> Result<Option<Vec<WarmupOperation>>, WarmupSourceError> {
        let dir = self.tenant_dir(tenant_key);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(WarmupSourceError::Io(format!(
                    "{}: {}",
                    dir.display(),
                    e
                )))
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut items = Vec::new();
        for path in paths {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            match extension.as_deref() {
                Some("graphql") | Some("gql") => {
                    let query = tokio::fs::read_to_string(&path).await?;
                    if !query.trim().is_empty() {
                        items.push(WarmupOperation::new(query));
                    }
                }
                Some("json") => {
                    let bytes = tokio::fs::read(&path).await?;
                    let decoded: OperationFile = serde_json::from_slice(&bytes).map_err(|e| {
                        WarmupSourceError::Decode(format!("{}: {}", path.display(), e))
                    })?;
                    match decoded {
                        OperationFile::One(operation) => items.push(operation),
                        OperationFile::Many(operations) => items.extend(operations),
                    }
                }
                _ => log::debug!("Skipping non-operation file {}", path.display()),
            }
        }

        Ok(Some(items))
    }
}

/// Transport for warmup manifests, e.g. a CDN client
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Raw manifest for `tenant_key`, or `None` if none is published yet
    async fn fetch(&self, tenant_key: &str) -> Result<Option<Vec<u8>>, WarmupSourceError>;
}

/// Published list of operations: `{"version": 1, "operations": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupManifest {
    pub version: u32,
    #[serde(default)]
    pub operations: Vec<WarmupOperation>,
}

pub const MANIFEST_VERSION: u32 = 1;

pub struct ManifestSource {
    fetcher: Arc<dyn ManifestFetcher>,
}

impl ManifestSource {
    pub fn new(fetcher: Arc<dyn ManifestFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl WarmupSource for ManifestSource {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn load_items(
        &self,
        tenant_key: &str,
    ) -> Result<Option<Vec<WarmupOperation>>, WarmupSourceError> {
        let Some(bytes) = self.fetcher.fetch(tenant_key).await? else {
            return Ok(None);
        };
        let manifest: WarmupManifest = serde_json::from_slice(&bytes)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(WarmupSourceError::Decode(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }
        Ok(Some(manifest.operations))
    }
}

/// Replays what the warm query tracker recorded
pub struct TrackerSource {
    tracker: Arc<WarmQueryTracker>,
}

impl TrackerSource {
    pub fn new(tracker: Arc<WarmQueryTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl WarmupSource for TrackerSource {
    fn name(&self) -> &str {
        "tracker"
    }

    async fn load_items(
        &self,
        tenant_key: &str,
    ) -> Result<Option<Vec<WarmupOperation>>, WarmupSourceError> {
        Ok(self
            .tracker
            .snapshot(tenant_key)
            .map(|queries| queries.into_iter().map(WarmupOperation::new).collect()))
    }
}

/// Sources tried in order until one answers
#[derive(Clone, Default)]
pub struct SourceChain {
    sources: Vec<Arc<dyn WarmupSource>>,
}

impl SourceChain {
    pub fn new(sources: Vec<Arc<dyn WarmupSource>>) -> Self {
        Self { sources }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// First answer in order, with the name of the source that gave it.
    /// Errors are logged and skipped.
    pub async fn load(&self, tenant_key: &str) -> Option<(String, Vec<WarmupOperation>)> {
        for source in &self.sources {
            match source.load_items(tenant_key).await {
                Ok(Some(items)) => return Some((source.name().to_string(), items)),
                Ok(None) => log::info!(
                    "Warmup source '{}' has nothing for tenant '{}'",
                    source.name(),
                    tenant_key
                ),
                Err(e) => log::warn!(
                    "Warmup source '{}' failed for tenant '{}': {}",
                    source.name(),
                    tenant_key,
                    e
                ),
            }
        }
        None
    }
}
