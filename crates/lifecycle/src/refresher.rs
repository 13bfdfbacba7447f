// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential Refresher (spec.md §4.8): keeps a run's mounted buffer-access
//! credentials ahead of their expiry for as long as the run is live.
//!
//! Grounded on `oj-core::timer`/`oj-daemon::engine::runtime::handlers::timer`'s
//! `TimerId`-keyed scheduling abstraction, repurposed into a priority queue
//! ordered by soonest expiry rather than a flat timer wheel, since the
//! refresher only ever cares about the single next-to-expire credential.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tyger_access::AccessMode;
use tyger_core::{BufferId, RunId};

use crate::backoff::Backoff;

/// One credential this run depends on, as minted for a buffer parameter at
/// run-create time (or by a prior refresh).
#[derive(Debug, Clone)]
pub struct CredentialEntry {
    pub param_name: String,
    pub buffer_id: BufferId,
    pub mode: AccessMode,
    pub uri: String,
    pub expires_at_ms: u64,
}

struct State {
    by_run: HashMap<RunId, HashMap<String, CredentialEntry>>,
    heap: BinaryHeap<Reverse<(u64, RunId, String)>>,
}

/// Cheaply cloned handle shared between the engine (which registers and
/// retires runs) and the background task that re-mints credentials.
#[derive(Clone)]
pub struct RefresherHandle {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
}

impl Default for RefresherHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl RefresherHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State { by_run: HashMap::new(), heap: BinaryHeap::new() })),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Register a run's credentials for watching. Wakes the background
    /// loop in case this run's soonest expiry now precedes whatever it
    /// was already waiting on (spec.md §4.8: "a new run is registered").
    pub fn register(&self, run_id: RunId, entries: Vec<CredentialEntry>) {
        if entries.is_empty() {
            return;
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let slot = state.by_run.entry(run_id).or_default();
        for entry in entries {
            state.heap.push(Reverse((entry.expires_at_ms, run_id, entry.param_name.clone())));
            slot.insert(entry.param_name.clone(), entry);
        }
        drop(guard);
        self.notify.notify_one();
    }

    /// Stop watching a run once it has reached a terminal state (spec.md
    /// §4.8: "a run reaches terminal (remove)"). Stale heap entries for
    /// this run are discarded lazily as they're popped.
    pub fn remove(&self, run_id: RunId) {
        self.state.lock().by_run.remove(&run_id);
    }

    /// Earliest wakeup deadline across every still-registered credential,
    /// `refresh_window_ms` before its expiry.
    fn next_due_at(&self, refresh_window_ms: u64) -> Option<u64> {
        let state = self.state.lock();
        state.heap.peek().map(|Reverse((expires_at_ms, _, _))| expires_at_ms.saturating_sub(refresh_window_ms))
    }

    /// Pop every entry due for refresh (ordered earliest-first) whose
    /// owning run is still registered, grouping by run so the whole run's
    /// secret map can be rewritten in one `refresh_secret` call.
    fn drain_due(&self, now_ms: u64, refresh_window_ms: u64) -> HashMap<RunId, Vec<CredentialEntry>> {
        let mut state = self.state.lock();
        let mut due: HashMap<RunId, Vec<CredentialEntry>> = HashMap::new();
        while let Some(Reverse((expires_at_ms, run_id, param_name))) = state.heap.peek().cloned() {
            if expires_at_ms.saturating_sub(refresh_window_ms) > now_ms {
                break;
            }
            state.heap.pop();
            let Some(slot) = state.by_run.get(&run_id) else { continue };
            let Some(entry) = slot.get(&param_name) else { continue };
            if entry.expires_at_ms != expires_at_ms {
                // A newer registration already superseded this heap entry.
                continue;
            }
            due.entry(run_id).or_default().push(entry.clone());
        }
        due
    }

    fn reinsert(&self, run_id: RunId, entry: CredentialEntry) {
        let mut state = self.state.lock();
        state.heap.push(Reverse((entry.expires_at_ms, run_id, entry.param_name.clone())));
        if let Some(slot) = state.by_run.get_mut(&run_id) {
            slot.insert(entry.param_name.clone(), entry);
        }
    }

    fn all_for_run(&self, run_id: RunId) -> HashMap<String, CredentialEntry> {
        self.state.lock().by_run.get(&run_id).cloned().unwrap_or_default()
    }

    /// Run the refresher loop forever (spawned once per [`crate::engine::Engine`]).
    /// `remint` mints a fresh credential for `(run_id, buffer_id, mode)` and
    /// returns the new `(uri, expires_at_ms)`. `push_secret` patches the
    /// workload's secret object with the run's full, current secret map.
    pub async fn run<Remint, RemintFut, Push, PushFut>(
        &self,
        refresh_window_ms: u64,
        now_ms: impl Fn() -> u64,
        remint: Remint,
        push_secret: Push,
    ) where
        Remint: Fn(RunId, BufferId, AccessMode) -> RemintFut,
        RemintFut: std::future::Future<Output = Option<(String, u64)>>,
        Push: Fn(RunId, std::collections::HashMap<String, String>) -> PushFut,
        PushFut: std::future::Future<Output = bool>,
    {
        loop {
            let wait_ms = match self.next_due_at(refresh_window_ms) {
                None => None,
                Some(due_at) => Some(due_at.saturating_sub(now_ms())),
            };

            match wait_ms {
                None => self.notify.notified().await,
                Some(0) => {}
                Some(ms) => {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                        _ = self.notify.notified() => {}
                    }
                }
            }

            let due = self.drain_due(now_ms(), refresh_window_ms);
            for (run_id, entries) in due {
                let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(600));
                let mut refreshed_any = false;
                for entry in entries {
                    match remint(run_id, entry.buffer_id, entry.mode).await {
                        Some((uri, expires_at_ms)) => {
                            let renewed = CredentialEntry { uri, expires_at_ms, ..entry };
                            self.reinsert(run_id, renewed);
                            refreshed_any = true;
                        }
                        None => {
                            tracing::warn!(%run_id, param = %entry.param_name, "credential re-mint failed, retrying later");
                            let delay = backoff.next_delay();
                            self.reinsert(run_id, entry);
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
                if refreshed_any {
                    let secret_map: HashMap<String, String> =
                        self.all_for_run(run_id).into_iter().map(|(name, entry)| (name, entry.uri)).collect();
                    if !push_secret(run_id, secret_map).await {
                        tracing::warn!(%run_id, "failed to push refreshed credentials to workload");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "refresher_tests.rs"]
mod tests;
