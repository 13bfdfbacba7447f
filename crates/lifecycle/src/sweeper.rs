// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run Sweeper (spec.md §4.6): a fixed-interval reconciliation pass that
//! catches what the per-run observer can miss — runs whose workload
//! objects never came up, and terminal runs whose logs still need
//! archiving or whose grace period has elapsed.
//!
//! Grounded on `oj-daemon::engine::runtime::monitor`'s timer-driven
//! reconciliation loop, replaced with spec.md §4.6's two sweep passes.
//! `tyger-store`'s WAL is append-only (ported from `oj-storage`), so the
//! "delete the row" outcomes spec.md §4.6 describes for an orphaned or
//! already-absent run are implemented as a `Failed` transition rather than
//! a row deletion — recorded as a resolved Open Question in DESIGN.md.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tyger_core::{Clock, RunId, RunStatus};
use tyger_store::PersistentStore;
use tyger_workload::WorkloadDriver;

use crate::archiver::LogArchiver;
use crate::subscribers::SubscriberRegistry;

#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub provisioning_timeout_ms: u64,
    pub log_retention_grace_ms: u64,
    pub cancel_hard_deadline_ms: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            provisioning_timeout_ms: 10 * 60 * 1000,
            log_retention_grace_ms: 30_000,
            cancel_hard_deadline_ms: 5 * 60 * 1000,
        }
    }
}

/// Runs the orphan and terminal sweeps on `config.interval` until the
/// process exits. Takes `&self`-style dependencies directly (rather than
/// bundling into a struct) since the sweeper has no state of its own
/// beyond the timer.
pub async fn run<C: Clock, D: WorkloadDriver>(
    store: Arc<Mutex<PersistentStore<C>>>,
    driver: Arc<D>,
    archiver: Arc<LogArchiver>,
    subscribers: SubscriberRegistry,
    clock: C,
    config: SweeperConfig,
) {
    let mut ticker = tokio::time::interval(config.interval);
    loop {
        ticker.tick().await;
        orphan_sweep(&store, &driver, &clock, &config).await;
        terminal_sweep(&store, &driver, &archiver, &subscribers, &clock, &config).await;
    }
}

async fn orphan_sweep<C: Clock, D: WorkloadDriver>(
    store: &Arc<Mutex<PersistentStore<C>>>,
    driver: &Arc<D>,
    clock: &C,
    config: &SweeperConfig,
) {
    let now_ms = clock.epoch_ms();
    let mut cursor = None;
    loop {
        let (page, next_cursor) = {
            let store = store.lock();
            store.list_runs(cursor, 100)
        };
        if page.is_empty() {
            break;
        }
        for run in &page {
            if run.status != RunStatus::Pending {
                continue;
            }
            if now_ms.saturating_sub(run.created_at_ms) < config.provisioning_timeout_ms {
                continue;
            }
            let label = format!("tyger-run={}", run.id);
            match driver.list_by_label(&label, None).await {
                Ok(objects) if objects.run_ids.is_empty() => {
                    tracing::warn!(run_id = %run.id, "orphaned run never provisioned workload objects, failing it");
                    let mut store = store.lock();
                    let _ = store.update_run_status(
                        run.id,
                        run.version,
                        RunStatus::Failed,
                        Some("provisioning timed out: no workload objects were ever created".to_string()),
                    );
                }
                Ok(_) => {
                    // Objects exist but no observer is attached (process restarted mid-run);
                    // the engine re-attaches one on the next `create_run`/startup reconciliation pass.
                }
                Err(e) => {
                    tracing::warn!(run_id = %run.id, error = %e, "orphan sweep: list_by_label failed");
                }
            }
        }
        cursor = next_cursor;
        if cursor.is_none() {
            break;
        }
    }
}

async fn terminal_sweep<C: Clock, D: WorkloadDriver>(
    store: &Arc<Mutex<PersistentStore<C>>>,
    driver: &Arc<D>,
    archiver: &Arc<LogArchiver>,
    subscribers: &SubscriberRegistry,
    clock: &C,
    config: &SweeperConfig,
) {
    let now_ms = clock.epoch_ms();
    let mut continuation = None;
    loop {
        let page = match driver.list_by_label("tyger-job", continuation.clone()).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "terminal sweep: list_by_label failed");
                return;
            }
        };
        if page.run_ids.is_empty() && page.continuation.is_none() {
            break;
        }

        for run_id in &page.run_ids {
            handle_terminal_candidate(*run_id, store, driver, archiver, subscribers, now_ms, config).await;
        }

        continuation = page.continuation.clone();
        if continuation.is_none() {
            break;
        }
    }
}

async fn handle_terminal_candidate<C: Clock, D: WorkloadDriver>(
    run_id: RunId,
    store: &Arc<Mutex<PersistentStore<C>>>,
    driver: &Arc<D>,
    archiver: &Arc<LogArchiver>,
    subscribers: &SubscriberRegistry,
    now_ms: u64,
    config: &SweeperConfig,
) {
    let run = { store.lock().get_run(run_id) };
    let run = match run {
        Ok(run) => run,
        Err(_) => {
            // No row for this job: it was never recorded, or history has
            // rolled past it. Either way reclaim the cluster objects.
            let _ = driver.delete_all(run_id).await;
            return;
        }
    };

    if !run.status.is_terminal() {
        if run.status == RunStatus::Canceling
            && now_ms.saturating_sub(run.created_at_ms) >= config.cancel_hard_deadline_ms
        {
            // Archive first, then delete (spec.md §4.7): the pods are still
            // around to read logs from here, so this is the last chance to
            // capture them before `delete_all` reclaims the objects.
            let content = driver.list_logs(run_id, Default::default()).await.unwrap_or_default();
            if archiver.archive(run_id, content).await.is_err() {
                return;
            }
            let _ = driver.delete_all(run_id).await;

            let mut store_guard = store.lock();
            let canceled = match store_guard.update_run_status(run_id, run.version, RunStatus::Canceled, None) {
                Ok(updated) => updated,
                Err(_) => return,
            };
            if let Ok(finalized) = store_guard.finalize_run(run_id, canceled.version, now_ms) {
                drop(store_guard);
                subscribers.notify(&finalized);
            }
        }
        return;
    }

    if run.is_final {
        if now_ms.saturating_sub(run.logs_archived_at_ms.unwrap_or(now_ms)) >= config.log_retention_grace_ms {
            let _ = driver.delete_all(run_id).await;
        }
        return;
    }

    if run.logs_archived_at_ms.is_none() {
        let content = driver.list_logs(run_id, Default::default()).await.unwrap_or_default();
        if archiver.archive(run_id, content).await.is_err() {
            return;
        }
        if run.status.is_canceling_or_canceled() {
            let _ = driver.delete_all(run_id).await;
        }
        let mut store = store.lock();
        if let Ok(updated) = store.finalize_run(run_id, run.version, now_ms) {
            drop(store);
            subscribers.notify(&updated);
        }
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
