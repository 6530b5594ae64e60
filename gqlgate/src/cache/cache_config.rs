// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache configuration and policies

use serde::{Deserialize, Serialize};

/// Smallest plan budget that can hold a plan under `CostPolicy::EstimatedSize`
pub const MIN_ESTIMATED_PLAN_COST: u64 = 1024;

/// Cache configuration shared by every cache set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable/disable caching entirely
    pub enabled: bool,

    /// Compiled plans, keyed by identity hash
    pub plan: LevelConfig,

    /// Normalized operations, keyed by the raw query text
    pub normalization: LevelConfig,

    /// Validation outcomes, keyed by identity hash
    pub validation: LevelConfig,

    /// How the cost of a compiled plan is charged against `plan.max_cost`
    pub cost_policy: CostPolicy,
}

/// Configuration for one cache of a cache set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub enabled: bool,

    /// Total cost the cache may hold before evicting
    pub max_cost: u64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_cost: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostPolicy {
    /// Every plan costs 1, so `max_cost` is an entry count
    Unit,
    /// Plans cost their estimated size in bytes
    EstimatedSize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            plan: LevelConfig {
                enabled: true,
                max_cost: 10_000,
            },
            normalization: LevelConfig {
                enabled: true,
                max_cost: 20_000,
            },
            validation: LevelConfig {
                enabled: true,
                max_cost: 20_000,
            },
            cost_policy: CostPolicy::Unit,
        }
    }
}

impl CacheConfig {
    /// Configuration with every cache replaced by a no-op backend
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Create configuration for memory-constrained environments
    pub fn memory_constrained() -> Self {
        let mut config = Self::default();
        config.plan.max_cost = 16 * 1024 * 1024; // 16MB of estimated plan size
        config.normalization.max_cost = 2_000;
        config.validation.max_cost = 2_000;
        config.cost_policy = CostPolicy::EstimatedSize;
        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        for (name, level) in [
            ("plan", &self.plan),
            ("normalization", &self.normalization),
            ("validation", &self.validation),
        ] {
            if level.enabled && level.max_cost == 0 {
                return Err(format!("{} cache must have max_cost > 0", name));
            }
        }

        if self.plan.enabled
            && self.cost_policy == CostPolicy::EstimatedSize
            && self.plan.max_cost < MIN_ESTIMATED_PLAN_COST
        {
            return Err(format!(
                "plan cache max_cost ({}) is below the minimum of {} for estimated-size costing",
                self.plan.max_cost, MIN_ESTIMATED_PLAN_COST
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(CacheConfig::default().validate().is_ok());
        assert!(CacheConfig::disabled().validate().is_ok());
        assert!(CacheConfig::memory_constrained().validate().is_ok());
    }

    #[test]
    fn test_zero_cost_is_rejected() {
        let mut config = CacheConfig::default();
        config.validation.max_cost = 0;
        assert!(config.validate().unwrap_err().contains("validation"));

        config.validation.enabled = false;
        assert!(config.validate().is_ok());

        config.enabled = false;
        config.plan.max_cost = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_estimated_size_needs_room_for_a_plan() {
        let mut config = CacheConfig::default();
        config.cost_policy = CostPolicy::EstimatedSize;
        config.plan.max_cost = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"plan":{"max_cost":1},"cost_policy":"unit"}"#).unwrap();
        assert_eq!(config.plan.max_cost, 1);
        assert!(config.plan.enabled);
        assert!(config.enabled);
        assert_eq!(config.normalization.max_cost, 20_000);
    }
}
