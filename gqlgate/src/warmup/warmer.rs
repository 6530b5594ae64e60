// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Warmup runner
//!
//! Pushes a batch of operations through the lookup pipeline with a bounded
//! number of workers and an optional items-per-second ceiling, until the
//! warmup phase's deadline. Hitting the deadline aborts the remaining items;
//! it never fails.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval, timeout_at, MissedTickBehavior};

use super::sources::WarmupOperation;
use crate::config::WarmupConfig;
use crate::error::GatewayResult;

/// Cumulative warmup counters across every run
#[derive(Debug, Default)]
pub struct WarmupProgress {
    planned: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmupProgressSnapshot {
    pub planned: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl WarmupProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WarmupProgressSnapshot {
        WarmupProgressSnapshot {
            planned: self.planned.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of one warmup run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmupReport {
    pub tenant_key: String,
    pub source: String,
    pub planned: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

impl WarmupReport {
    fn record(
        &mut self,
        progress: &WarmupProgress,
        joined: Result<GatewayResult<()>, JoinError>,
    ) {
        match joined {
            Ok(Ok(())) => {
                self.completed += 1;
                progress.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                log::debug!("Warmup operation for tenant '{}' failed: {}", self.tenant_key, e);
                self.failed += 1;
                progress.failed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                log::debug!("Warmup task for tenant '{}' died: {}", self.tenant_key, e);
                self.failed += 1;
                progress.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Run `execute` once per item, encoded as a request body
///
/// `deadline` belongs to the whole warmup phase, so tenants warmed one after
/// another share it.
pub async fn run_warmup<F, Fut>(
    tenant_key: &str,
    source: &str,
    items: Vec<WarmupOperation>,
    config: &WarmupConfig,
    deadline: tokio::time::Instant,
    progress: &WarmupProgress,
    execute: F,
) -> WarmupReport
where
    F: Fn(Vec<u8>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = GatewayResult<()>> + Send + 'static,
{
    let started = Instant::now();
    let total = items.len();
    let mut report = WarmupReport {
        tenant_key: tenant_key.to_string(),
        source: source.to_string(),
        planned: total,
        ..WarmupReport::default()
    };
    progress.planned.fetch_add(total as u64, Ordering::Relaxed);
    log::info!(
        "Warming tenant '{}' with {} operation(s) from '{}'",
        tenant_key,
        total,
        source
    );

    let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
    let mut ticker = config.items_per_second.filter(|rate| *rate > 0).map(|rate| {
        let mut ticker = interval(Duration::from_secs_f64(1.0 / f64::from(rate)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let mut tasks = JoinSet::new();
    let mut dispatched = 0;
    for item in items {
        if tokio::time::Instant::now() >= deadline {
            report.timed_out = true;
            break;
        }
        if let Some(ticker) = ticker.as_mut() {
            if timeout_at(deadline, ticker.tick()).await.is_err() {
                report.timed_out = true;
                break;
            }
        }
        let permit = match timeout_at(deadline, Arc::clone(&semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => break,
            Err(_) => {
                report.timed_out = true;
                break;
            }
        };
        dispatched += 1;

        let body = match item.to_request_bytes() {
            Ok(body) => body,
            Err(e) => {
                log::debug!("Skipping unencodable warmup operation: {}", e);
                report.skipped += 1;
                continue;
            }
        };
        let execute = execute.clone();
        tasks.spawn(async move {
            let _permit = permit;
            execute(body).await
        });
    }

    while !report.timed_out {
        match timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(joined)) => report.record(progress, joined),
            Ok(None) => break,
            Err(_) => report.timed_out = true,
        }
    }

    if report.timed_out {
        // Operations that finished before the deadline still count
        while let Some(joined) = tasks.try_join_next() {
            report.record(progress, joined);
        }
        let abandoned = tasks.len() + (total - dispatched);
        tasks.abort_all();
        report.skipped += abandoned;
        log::warn!(
            "Warmup of tenant '{}' hit the warmup phase deadline; {} operation(s) abandoned",
            tenant_key,
            abandoned
        );
    }
    progress
        .skipped
        .fetch_add(report.skipped as u64, Ordering::Relaxed);

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    log::info!(
        "Warmup of tenant '{}' finished: {} completed, {} failed, {} skipped in {}ms",
        tenant_key,
        report.completed,
        report.failed,
        report.skipped,
        report.elapsed_ms
    );
    report
}
