// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Deduplicating compiler
//!
//! A registry from compilation key to the receiving half of a single-assignment
//! channel. The first caller for a key registers the channel and starts the
//! work on a detached task; later callers for the same key wait on the same
//! channel. The task removes the registry entry before publishing its outcome,
//! so a caller arriving afterwards starts a fresh compilation.
//!
//! The work runs on its own task rather than in the leader's future: if the
//! leader is cancelled, followers still get their result and a successful plan
//! is still written to the cache by the work itself.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use super::{CompileError, CompiledPlan};

pub type CompileOutcome = Result<Arc<CompiledPlan>, CompileError>;

type Registry = HashMap<String, watch::Receiver<Option<CompileOutcome>>>;

/// Whether a caller ran the compilation or attached to one already in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileRole {
    Leader,
    Follower,
}

#[derive(Default)]
pub struct DedupCompiler {
    in_flight: Arc<Mutex<Registry>>,
}

impl DedupCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compilations currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Run `work` unless a compilation for `key` is already in flight, and
    /// return the shared outcome. `work` runs on the blocking pool.
    pub async fn compile<F>(&self, key: String, work: F) -> (CompileOutcome, CompileRole)
    where
        F: FnOnce() -> CompileOutcome + Send + 'static,
    {
        let (mut receiver, role) = {
            let mut registry = self.in_flight.lock();
            match registry.get(&key) {
                Some(receiver) => (receiver.clone(), CompileRole::Follower),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    registry.insert(key.clone(), receiver.clone());

                    let registry = Arc::clone(&self.in_flight);
                    tokio::spawn(async move {
                        let outcome = run_blocking(work).await;
                        registry.lock().remove(&key);
                        // Every waiter may be gone; the outcome is still cached by `work`
                        let _ = sender.send(Some(outcome));
                    });
                    (receiver, CompileRole::Leader)
                }
            }
        };

        loop {
            let published = receiver.borrow_and_update().clone();
            if let Some(outcome) = published {
                return (outcome, role);
            }
            if receiver.changed().await.is_err() {
                return (
                    Err(CompileError::Internal(
                        "compilation was abandoned before completing".to_string(),
                    )),
                    role,
                );
            }
        }
    }

    /// Compile without consulting or joining the registry
    pub async fn compile_fresh<F>(&self, work: F) -> CompileOutcome
    where
        F: FnOnce() -> CompileOutcome + Send + 'static,
    {
        run_blocking(work).await
    }
}

async fn run_blocking<F>(work: F) -> CompileOutcome
where
    F: FnOnce() -> CompileOutcome + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(outcome) => outcome,
        Err(e) => Err(CompileError::Internal(format!(
            "compilation task failed: {}",
            e
        ))),
    }
}
