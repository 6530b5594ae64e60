// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::error::{GatewayError, GatewayResult};

/// Top-level configuration of an operation coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub cache: CacheConfig,

    pub warmup: WarmupConfig,

    /// Longest a retiring cache set waits for in-flight requests before it
    /// is closed anyway
    pub retire_grace_period_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            warmup: WarmupConfig::default(),
            retire_grace_period_ms: 30_000,
        }
    }
}

impl GatewayConfig {
    pub fn from_json_str(json: &str) -> GatewayResult<Self> {
        serde_json::from_str(json).map_err(|e| GatewayError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn retire_grace_period(&self) -> Duration {
        Duration::from_millis(self.retire_grace_period_ms)
    }

    /// Invalid cache sizing is reported as a cache backend error
    pub fn validate(&self) -> GatewayResult<()> {
        self.cache.validate().map_err(GatewayError::CacheBackend)?;
        self.warmup.validate().map_err(GatewayError::Config)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupConfig {
    /// Warm freshly built cache sets before they are activated
    pub enabled: bool,

    /// Operations compiled concurrently
    pub workers: usize,

    /// Ceiling on operations started per second; unlimited when absent
    pub items_per_second: Option<u32>,

    /// Deadline for the whole warmup phase of a schema update, shared by
    /// every tenant warmed in it
    pub timeout_ms: u64,

    /// Sources tried in order, after any sources supplied programmatically
    pub sources: Vec<WarmupSourceConfig>,

    /// Fall back to replaying the warm query tracker
    pub in_memory_fallback: bool,

    /// Entries remembered per tenant key by the warm query tracker
    pub tracker_capacity: usize,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 4,
            items_per_second: None,
            timeout_ms: 30_000,
            sources: Vec::new(),
            in_memory_fallback: true,
            tracker_capacity: 1_000,
        }
    }
}

impl WarmupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Deadline for a warmup phase starting now
    pub fn deadline(&self) -> tokio::time::Instant {
        tokio::time::Instant::now() + self.timeout()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.workers == 0 {
            return Err("warmup workers must be > 0".to_string());
        }
        if self.items_per_second == Some(0) {
            return Err("warmup items_per_second must be > 0 when set".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("warmup timeout_ms must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WarmupSourceConfig {
    /// Directory of operation files; feature flags read `<path>/<flag>/`
    Filesystem { path: PathBuf },
    /// Replay of the warm query tracker
    Tracker,
}
