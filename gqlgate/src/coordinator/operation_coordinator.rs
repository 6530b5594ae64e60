// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Operation Coordinator - request-to-plan pipeline for the gateway
//!
//! Owns the cache set routing table, the deduplicating compiler and the warm
//! query tracker, and exposes the single `lookup` entry point that request
//! handling code calls.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout_at;

use super::stats::{CoordinatorStats, CoordinatorStatsSnapshot};
use crate::cache::{CacheLease, CacheRegistry, CacheSet, CacheSetKey};
use crate::config::{GatewayConfig, WarmupSourceConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::normalize::{
    normalize_operation, request_key, GraphQLRequest, NormalizedOperation, ParsedOperation,
};
use crate::plan::{CompileOptions, CompileRole, CompiledPlan, DedupCompiler, PlanCompiler};
use crate::schema::{validate_operation, Schema};
use crate::warmup::{
    run_warmup, FilesystemSource, SourceChain, TrackerSource, WarmQueryTracker, WarmupProgress,
    WarmupReport, WarmupSource,
};

/// Per-request switches that change how a plan is produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupOptions {
    /// The response embeds the query plan
    pub include_query_plan: bool,
    /// The response carries planning trace output
    pub trace: bool,
}

impl LookupOptions {
    /// Plans produced for these requests carry per-request data, so they are
    /// compiled privately and never cached
    pub fn bypasses_cache(&self) -> bool {
        self.include_query_plan || self.trace
    }
}

/// Which pipeline steps were served from cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheHitFlags {
    pub normalization: bool,
    pub validation: bool,
    pub plan: bool,
}

#[derive(Debug, Clone)]
pub struct LookupOutcome {
    pub plan: Arc<CompiledPlan>,
    pub hits: CacheHitFlags,
    pub operation: ParsedOperation,
}

/// A new configuration from the change feed: the base graph plus one schema
/// per feature flag
#[derive(Debug, Clone, Default)]
pub struct SchemaUpdate {
    pub base: Schema,
    pub feature_flags: BTreeMap<String, Schema>,
}

impl SchemaUpdate {
    pub fn new(base: Schema) -> Self {
        Self {
            base,
            feature_flags: BTreeMap::new(),
        }
    }

    pub fn with_feature_flag(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.feature_flags.insert(name.into(), schema);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaUpdateReport {
    /// Cache sets built and activated
    pub built: Vec<CacheSetKey>,
    /// Tenant keys whose schema version did not change
    pub unchanged: Vec<String>,
    /// Tenant keys no longer configured
    pub removed: Vec<String>,
    /// Cache sets taken out of routing
    pub retired: Vec<CacheSetKey>,
    pub warmups: Vec<WarmupReport>,
}

/// Operation Coordinator - turns request bytes into a compiled plan
///
/// Cloning is cheap; clones share every cache, counter and the routing table.
#[derive(Clone)]
pub struct OperationCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: GatewayConfig,
    compiler: Arc<dyn PlanCompiler>,
    registry: CacheRegistry,
    dedup: DedupCompiler,
    tracker: Arc<WarmQueryTracker>,
    sources: SourceChain,
    stats: CoordinatorStats,
    progress: WarmupProgress,
    /// Serializes schema updates
    updates: Mutex<()>,
}

impl OperationCoordinator {
    /// Create a coordinator using only the warmup sources named in `config`
    pub fn new(config: GatewayConfig, compiler: Arc<dyn PlanCompiler>) -> GatewayResult<Self> {
        Self::with_sources(config, compiler, Vec::new())
    }

    /// Create a coordinator
    ///
    /// # Arguments
    /// * `config` - Cache, warmup and retirement settings
    /// * `compiler` - The plan-building routine
    /// * `extra_sources` - Warmup sources tried before the configured ones,
    ///   e.g. a CDN-backed `ManifestSource`
    ///
    /// # Returns
    /// * `Err(GatewayError::CacheBackend)` - Invalid cache sizing
    /// * `Err(GatewayError::Config)` - Invalid warmup settings
    pub fn with_sources(
        config: GatewayConfig,
        compiler: Arc<dyn PlanCompiler>,
        extra_sources: Vec<Arc<dyn WarmupSource>>,
    ) -> GatewayResult<Self> {
        config.validate()?;

        let tracker = Arc::new(WarmQueryTracker::new(config.warmup.tracker_capacity));
        let mut sources = extra_sources;
        let mut replays_tracker = false;
        for source in &config.warmup.sources {
            match source {
                WarmupSourceConfig::Filesystem { path } => {
                    sources.push(Arc::new(FilesystemSource::new(path.clone())));
                }
                WarmupSourceConfig::Tracker => {
                    replays_tracker = true;
                    sources.push(Arc::new(TrackerSource::new(Arc::clone(&tracker))));
                }
            }
        }
        if config.warmup.in_memory_fallback && !replays_tracker {
            sources.push(Arc::new(TrackerSource::new(Arc::clone(&tracker))));
        }

        let sources = SourceChain::new(sources);
        log::info!(
            "Operation coordinator ready (warmup sources: [{}])",
            sources.names().join(", ")
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                compiler,
                registry: CacheRegistry::new(),
                dedup: DedupCompiler::new(),
                tracker,
                sources,
                stats: CoordinatorStats::new(),
                progress: WarmupProgress::new(),
                updates: Mutex::new(()),
            }),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn tracker(&self) -> &Arc<WarmQueryTracker> {
        &self.inner.tracker
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.inner.registry
    }

    pub fn cache_set(&self, tenant_key: &str) -> Option<Arc<CacheSet>> {
        self.inner.registry.get(tenant_key)
    }

    /// Resolve the compiled plan for a request
    ///
    /// # Arguments
    /// * `tenant_key` - Empty for the base graph, otherwise a feature flag name
    /// * `request` - Raw request body (`query`, `operationName`, `variables`)
    ///
    /// # Returns
    /// * `Ok(LookupOutcome)` - The plan plus which steps were cache hits
    /// * `Err(GatewayError)` - Use `is_client_error()` to tell bad input from
    ///   a server-side failure
    pub async fn lookup(&self, tenant_key: &str, request: &[u8]) -> GatewayResult<LookupOutcome> {
        self.lookup_with_options(tenant_key, request, LookupOptions::default())
            .await
    }

    pub async fn lookup_with_options(
        &self,
        tenant_key: &str,
        request: &[u8],
        options: LookupOptions,
    ) -> GatewayResult<LookupOutcome> {
        let lease = self.inner.route(tenant_key)?;
        self.inner.lookup_in(lease, request, options).await
    }

    /// Bring the routing table in line with `update`
    ///
    /// Only tenants whose schema version changed get a new cache set. New
    /// sets are warmed while still building, then swapped in; the sets they
    /// replace, and those of removed feature flags, are retired.
    pub async fn apply_schema_update(
        &self,
        update: SchemaUpdate,
    ) -> GatewayResult<SchemaUpdateReport> {
        let inner = &self.inner;
        let _update = inner.updates.lock().await;

        if update.feature_flags.contains_key("") {
            return Err(GatewayError::Config(
                "feature flag names must not be empty".to_string(),
            ));
        }

        let mut report = SchemaUpdateReport::default();
        let mut desired: Vec<(String, Schema)> = vec![(String::new(), update.base)];
        desired.extend(update.feature_flags);

        let mut built = Vec::new();
        for (tenant_key, schema) in &desired {
            let version = schema.version();
            if let Some(current) = inner.registry.get(tenant_key) {
                if current.schema_version() == version {
                    report.unchanged.push(tenant_key.clone());
                    continue;
                }
            }
            built.push(CacheSet::build(
                CacheSetKey::new(version, tenant_key.clone()),
                Arc::new(schema.clone()),
                &inner.config.cache,
            )?);
        }

        report.removed = inner
            .registry
            .tenants()
            .into_iter()
            .filter(|tenant_key| !desired.iter().any(|(t, _)| t == tenant_key))
            .collect();

        if inner.config.warmup.enabled {
            let deadline = inner.config.warmup.deadline();
            for set in &built {
                if let Some(warmup) = inner.warm(set, deadline).await {
                    report.warmups.push(warmup);
                }
            }
        }

        report.built = built.iter().map(|set| set.key().clone()).collect();
        let grace = inner.config.retire_grace_period();
        for previous in inner.registry.swap(built, &report.removed) {
            report.retired.push(previous.key().clone());
            previous.retire(grace);
        }

        inner.tracker.retain_tenants(&inner.registry.tenants());
        log::info!(
            "Applied schema update: {} built, {} unchanged, {} removed",
            report.built.len(),
            report.unchanged.len(),
            report.removed.len()
        );
        Ok(report)
    }

    /// Apply every update from the change feed until it closes
    pub fn watch_schema_updates(&self, mut updates: mpsc::Receiver<SchemaUpdate>) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                if let Err(e) = coordinator.apply_schema_update(update).await {
                    log::warn!("Rejected schema update: {}", e);
                }
            }
            log::debug!("Schema update feed closed");
        })
    }

    /// Re-run warmup against every routed cache set, within one warmup deadline
    pub async fn warmup_all(&self) -> Vec<WarmupReport> {
        let deadline = self.inner.config.warmup.deadline();
        let mut reports = Vec::new();
        for set in self.inner.registry.snapshot() {
            if let Some(report) = self.inner.warm(&set, deadline).await {
                reports.push(report);
            }
        }
        reports
    }

    pub fn stats(&self) -> CoordinatorStatsSnapshot {
        CoordinatorStatsSnapshot {
            counters: self.inner.stats.counters(),
            warmup: self.inner.progress.snapshot(),
            in_flight_compilations: self.inner.dedup.in_flight(),
            cache_sets: self
                .inner
                .registry
                .snapshot()
                .iter()
                .map(|set| set.stats())
                .collect(),
        }
    }

    /// Unroute and retire every cache set
    pub fn shutdown(&self) {
        let grace = self.inner.config.retire_grace_period();
        let sets = self.inner.registry.drain();
        log::info!("Shutting down; retiring {} cache set(s)", sets.len());
        for set in sets {
            set.retire(grace);
        }
    }
}

impl Inner {
    fn route(&self, tenant_key: &str) -> GatewayResult<CacheLease> {
        match self.registry.route(tenant_key) {
            Some(lease) => Ok(lease),
            None if self.registry.is_empty() => Err(GatewayError::NotReady(
                "no schema has been loaded".to_string(),
            )),
            None => Err(GatewayError::UnknownTenant(tenant_key.to_string())),
        }
    }

    async fn lookup_in(
        self: &Arc<Self>,
        lease: CacheLease,
        body: &[u8],
        options: LookupOptions,
    ) -> GatewayResult<LookupOutcome> {
        let request = GraphQLRequest::from_bytes(body)?;
        let mut hits = CacheHitFlags::default();

        let normalization_key = request_key(request.operation_name.as_deref(), request.query());
        let normalized = match lease.normalization().get(&normalization_key) {
            Some(normalized) => {
                hits.normalization = true;
                CoordinatorStats::incr(&self.stats.normalization_hits);
                normalized
            }
            None => {
                CoordinatorStats::incr(&self.stats.normalization_misses);
                let normalized = Arc::new(normalize_operation(
                    request.query(),
                    request.operation_name.as_deref(),
                    lease.schema(),
                )?);
                lease
                    .normalization()
                    .set(normalization_key, Arc::clone(&normalized), 1);
                normalized
            }
        };

        let validation = match lease.validation().get(&normalized.hash) {
            Some(outcome) => {
                hits.validation = true;
                CoordinatorStats::incr(&self.stats.validation_hits);
                outcome
            }
            None => {
                CoordinatorStats::incr(&self.stats.validation_misses);
                let outcome = validate_operation(&normalized.definition, lease.schema());
                lease
                    .validation()
                    .set(normalized.hash, outcome.clone(), 1);
                outcome
            }
        };
        validation?;

        let compile_options = CompileOptions {
            tenant_key: lease.tenant_key().to_string(),
            schema_version: lease.schema_version().to_string(),
            trace: options.trace,
        };

        let plan = if options.bypasses_cache() {
            CoordinatorStats::incr(&self.stats.bypassed_compilations);
            let compiler = Arc::clone(&self.compiler);
            let schema = Arc::clone(lease.schema());
            let operation = Arc::clone(&normalized);
            self.dedup
                .compile_fresh(move || {
                    compiler
                        .compile(&operation, &schema, &compile_options)
                        .map(Arc::new)
                })
                .await?
        } else if let Some(plan) = lease.plans().get(&normalized.hash) {
            hits.plan = true;
            CoordinatorStats::incr(&self.stats.plan_hits);
            plan
        } else {
            CoordinatorStats::incr(&self.stats.plan_misses);
            self.compile_shared(&lease, &normalized, compile_options)
                .await?
        };

        let operation = ParsedOperation {
            raw_query: request.query.unwrap_or_default(),
            operation_name: request.operation_name,
            variables: request.variables,
            normalized,
        };
        Ok(LookupOutcome {
            plan,
            hits,
            operation,
        })
    }

    /// Compile through the dedup registry. The work itself writes the cache
    /// and the tracker, so it completes even if every caller goes away.
    async fn compile_shared(
        self: &Arc<Self>,
        lease: &CacheLease,
        normalized: &Arc<NormalizedOperation>,
        compile_options: CompileOptions,
    ) -> GatewayResult<Arc<CompiledPlan>> {
        // Keyed by cache set, not version: a rebuilt set for a version whose
        // retiring predecessor is still compiling must not share that work
        let key = format!("{}/{:016x}", lease.id(), normalized.hash);

        let work = {
            let inner = Arc::clone(self);
            let lease = lease.clone();
            let operation = Arc::clone(normalized);
            move || {
                if let Some(plan) = lease.plans().get(&operation.hash) {
                    return Ok(plan);
                }
                CoordinatorStats::incr(&inner.stats.compilations);
                match inner.compiler.compile(&operation, lease.schema(), &compile_options) {
                    Ok(plan) => {
                        let plan = Arc::new(plan);
                        let cost = lease.plan_cost(&plan);
                        if !lease.plans().set(operation.hash, Arc::clone(&plan), cost) {
                            log::debug!(
                                "Plan {:016x} for {} was not admitted (cost {})",
                                operation.hash,
                                lease.key(),
                                cost
                            );
                        }
                        inner.tracker.record(lease.tenant_key(), &operation.canonical);
                        Ok(plan)
                    }
                    Err(e) => {
                        CoordinatorStats::incr(&inner.stats.compilation_errors);
                        log::debug!(
                            "Compilation of {:016x} for {} failed: {}",
                            operation.hash,
                            lease.key(),
                            e
                        );
                        Err(e)
                    }
                }
            }
        };

        let (outcome, role) = self.dedup.compile(key, work).await;
        if role == CompileRole::Follower {
            CoordinatorStats::incr(&self.stats.deduplicated_waits);
        }
        outcome.map_err(GatewayError::from)
    }

    /// Warm `set` from the first warmup source that has something for it
    async fn warm(
        self: &Arc<Self>,
        set: &Arc<CacheSet>,
        deadline: tokio::time::Instant,
    ) -> Option<WarmupReport> {
        let loaded = timeout_at(deadline, self.sources.load(set.tenant_key())).await;
        let (source, items) = match loaded {
            Ok(loaded) => loaded?,
            Err(_) => {
                log::warn!(
                    "Warmup deadline passed while loading operations for {}; leaving it cold",
                    set.key()
                );
                return None;
            }
        };
        let lease = set.lease()?;
        let inner = Arc::clone(self);
        let execute = move |body: Vec<u8>| {
            let inner = Arc::clone(&inner);
            let lease = lease.clone();
            async move {
                inner
                    .lookup_in(lease, &body, LookupOptions::default())
                    .await
                    .map(|_| ())
            }
        };
        Some(
            run_warmup(
                set.tenant_key(),
                &source,
                items,
                &self.config.warmup,
                deadline,
                &self.progress,
                execute,
            )
            .await,
        )
    }
}
