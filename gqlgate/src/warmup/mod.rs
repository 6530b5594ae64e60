// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache warming
//!
//! The warm query tracker samples recently compiled operations per tenant;
//! warmup sources supply operations to precompile into a freshly built cache
//! set; the runner replays them at a bounded rate.

pub mod sources;
pub mod tracker;
pub mod warmer;

pub use sources::{
    FilesystemSource, ManifestFetcher, ManifestSource, SourceChain, TrackerSource,
    WarmupManifest, WarmupOperation, WarmupSource, WarmupSourceError, MANIFEST_VERSION,
};
pub use tracker::WarmQueryTracker;
pub use warmer::{run_warmup, WarmupProgress, WarmupProgressSnapshot, WarmupReport};
