// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Run Lifecycle Engine (spec.md §4.4): drives a run from `create_run`
//! through observation to finalization, and implements the in-process
//! [`ControlPlane`] surface.
//!
//! Grounded on `oj-daemon::engine::runtime::job` for the per-entity
//! state-machine shape (a handler per lifecycle step, shared mutable state
//! behind a lock) and `oj-daemon::engine::monitor` for the poll-then-derive
//! observer loop, replacing single-agent-process monitoring with spec.md
//! §4.3's pod/job-state → `RunStatus` derivation table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tyger_access::{AccessGrant, BufferAccessService};
use tyger_core::{
    BufferId, Clock, Codespec, Run, RunConfig, RunId, RunStatus, TygerError, TygerResult,
};
use tyger_store::PersistentStore;
use tyger_workload::{derive_status, LaunchRequest, LogOptions, WorkloadDriver};

use crate::archiver::{LogArchiver, LogFilterOptions};
use crate::backoff::Backoff;
use crate::codespec_resolver::CodespecResolver;
use crate::control_plane::{AccessMode, ControlPlane};
use crate::refresher::{CredentialEntry, RefresherHandle};
use crate::subscribers::{SubscriberRegistry, Subscription};
use crate::sweeper::{self, SweeperConfig};

const OBSERVE_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub credential_refresh_window_ms: u64,
    pub archive_backoff_cap: Duration,
    pub sweeper: SweeperConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            credential_refresh_window_ms: 10 * 60 * 1000,
            archive_backoff_cap: Duration::from_secs(3600),
            sweeper: SweeperConfig::default(),
        }
    }
}

/// Everything a spawned observer/finalizer task needs, bundled so it can
/// be cloned into `tokio::spawn` without the engine having to hand out an
/// `Arc<Self>` of itself (cheap: every field is either an `Arc` or a
/// `Clone`-able handle).
struct Shared<C: Clock, D: WorkloadDriver> {
    store: Arc<Mutex<PersistentStore<C>>>,
    clock: C,
    driver: Arc<D>,
    access: Arc<BufferAccessService>,
    subscribers: SubscriberRegistry,
    archiver: Arc<LogArchiver>,
    refresher: RefresherHandle,
    config: EngineConfig,
}

impl<C: Clock, D: WorkloadDriver> Clone for Shared<C, D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            driver: self.driver.clone(),
            access: self.access.clone(),
            subscribers: self.subscribers.clone(),
            archiver: self.archiver.clone(),
            refresher: self.refresher.clone(),
            config: self.config,
        }
    }
}

/// The Run Lifecycle Engine. Owns no cluster state directly — every
/// mutation goes through [`PersistentStore`]; this type just sequences the
/// calls spec.md §4.4 describes and keeps the observer tasks running.
pub struct Engine<C: Clock, D: WorkloadDriver> {
    shared: Shared<C, D>,
    resolver: CodespecResolver<C>,
    observers: Mutex<HashMap<RunId, JoinHandle<()>>>,
}

impl<C: Clock + 'static, D: WorkloadDriver> Engine<C, D> {
    pub fn new(
        store: Arc<Mutex<PersistentStore<C>>>,
        clock: C,
        driver: Arc<D>,
        access: Arc<BufferAccessService>,
        archiver: Arc<LogArchiver>,
        config: EngineConfig,
    ) -> Self {
        let resolver = CodespecResolver::new(store.clone());
        let shared = Shared {
            store,
            clock,
            driver,
            access,
            subscribers: SubscriberRegistry::new(),
            archiver,
            refresher: RefresherHandle::new(),
            config,
        };
        let engine = Self { shared, resolver, observers: Mutex::new(HashMap::new()) };
        engine.spawn_background_tasks();
        engine
    }

    /// Spawns the two process-level background passes spec.md §5 calls for:
    /// the Run Sweeper (`sweeper::run`) and the Credential Refresher
    /// (`RefresherHandle::run`). Detached rather than tracked in
    /// `self.observers` — unlike per-run observers, these run for the
    /// lifetime of the `Engine` itself and are never individually cancelled.
    fn spawn_background_tasks(&self) {
        let sweeper_shared = self.shared.clone();
        tokio::spawn(async move {
            sweeper::run(
                sweeper_shared.store,
                sweeper_shared.driver,
                sweeper_shared.archiver,
                sweeper_shared.subscribers,
                sweeper_shared.clock,
                sweeper_shared.config.sweeper,
            )
            .await;
        });

        let refresher_shared = self.shared.clone();
        let refresher = refresher_shared.refresher.clone();
        tokio::spawn(async move {
            let window_ms = refresher_shared.config.credential_refresh_window_ms;
            let clock_for_now = refresher_shared.clock.clone();
            let store = refresher_shared.store.clone();
            let access = refresher_shared.access.clone();
            let driver = refresher_shared.driver.clone();
            let clock_for_remint = refresher_shared.clock.clone();

            refresher
                .run(
                    window_ms,
                    move || clock_for_now.epoch_ms(),
                    move |_run_id, buffer_id, mode| {
                        let store = store.clone();
                        let access = access.clone();
                        let clock = clock_for_remint.clone();
                        async move {
                            let buffer = store.lock().get_buffer(buffer_id.as_str()).ok()?;
                            let now_ms = clock.epoch_ms();
                            let grant = access.grant_access(&buffer, mode, false, now_ms).ok()?;
                            Some((grant.uri, grant.expires_at_ms))
                        }
                    },
                    move |run_id, secret_map| {
                        let driver = driver.clone();
                        async move {
                            driver.refresh_secret(run_id, secret_map.into_iter().collect()).await.is_ok()
                        }
                    },
                )
                .await;
        });
    }

    pub fn subscribe(&self, run_id: RunId) -> Subscription {
        self.shared.subscribers.subscribe(run_id)
    }

    /// Re-attach an observer for a run that already has workload objects
    /// but no in-process task watching it (e.g. right after process
    /// restart, or when the Run Sweeper's orphan pass finds live objects).
    pub fn reattach_observer(&self, run_id: RunId) {
        self.spawn_observer(run_id);
    }

    pub fn refresher(&self) -> RefresherHandle {
        self.shared.refresher.clone()
    }

    fn spawn_observer(&self, run_id: RunId) {
        let shared = self.shared.clone();
        let handle = tokio::spawn(observe_loop(shared, run_id));
        self.observers.lock().insert(run_id, handle);
    }

    async fn mint_secret_map(
        &self,
        codespec: &Codespec,
        buffers: &IndexMap<String, BufferId>,
        now_ms: u64,
    ) -> TygerResult<(IndexMap<String, String>, Vec<CredentialEntry>)> {
        let mut secret_map = IndexMap::new();
        let mut entries = Vec::new();
        for name in codespec.buffers.all_names() {
            let buffer_id = buffers.get(name).ok_or_else(|| {
                TygerError::validation(format!("run is missing buffer parameter {name:?}"))
            })?;
            let buffer = self.shared.store.lock().get_buffer(buffer_id.as_str())?;
            let mode = if codespec.buffers.outputs.contains(name) {
                tyger_access::AccessMode::Write
            } else {
                tyger_access::AccessMode::Read
            };
            let grant: AccessGrant = self.shared.access.grant_access(&buffer, mode, false, now_ms)?;
            secret_map.insert(name.clone(), grant.uri.clone());
            entries.push(CredentialEntry {
                param_name: name.clone(),
                buffer_id: *buffer_id,
                mode,
                uri: grant.uri,
                expires_at_ms: grant.expires_at_ms,
            });
        }
        Ok((secret_map, entries))
    }

    async fn create_run_internal(&self, config: RunConfig) -> TygerResult<Run> {
        let codespec = self.resolver.resolve(&config.codespec_ref)?;
        validate_buffer_names(&codespec, &config.buffers)?;

        let now_ms = self.shared.clock.epoch_ms();
        let (secret_map, entries) = self.mint_secret_map(&codespec, &config.buffers, now_ms).await?;

        let run = self.shared.store.lock().create_run(config)?;

        let env = IndexMap::new();
        let launch = LaunchRequest {
            run_id: run.id,
            codespec: codespec.clone(),
            env: env.clone(),
            secret_map: secret_map.clone(),
            target: "job".to_string(),
        };
        if let Err(e) = self.shared.driver.launch_job(launch).await {
            self.fail_run_after_create(run.id, format!("launch_job failed: {e}")).await;
            return Err(e.into());
        }

        if run.has_workers() {
            let worker_ref = run.worker_codespec_ref.clone().expect("has_workers checked Some");
            match self.resolver.resolve(&worker_ref) {
                Ok(worker_codespec) => {
                    let worker_launch = LaunchRequest {
                        run_id: run.id,
                        codespec: worker_codespec,
                        env,
                        secret_map: secret_map.clone(),
                        target: "worker".to_string(),
                    };
                    if let Err(e) = self.shared.driver.launch_worker(worker_launch, run.worker_replicas).await {
                        self.fail_run_after_create(run.id, format!("launch_worker failed: {e}")).await;
                        return Err(e.into());
                    }
                }
                Err(e) => {
                    self.fail_run_after_create(run.id, format!("worker codespec resolution failed: {e}")).await;
                    return Err(e);
                }
            }
        }

        self.shared.refresher.register(run.id, entries);
        self.spawn_observer(run.id);

        Ok(run)
    }

    async fn fail_run_after_create(&self, run_id: RunId, reason: String) {
        tracing::warn!(%run_id, %reason, "run creation failed after the row was inserted, marking Failed");
        let current = { self.shared.store.lock().get_run(run_id) };
        if let Ok(current) = current {
            let result = {
                self.shared.store.lock().update_run_status(run_id, current.version, RunStatus::Failed, Some(reason))
            };
            if let Ok(run) = result {
                self.shared.subscribers.notify(&run);
            }
        }
        let _ = self.shared.driver.delete_all(run_id).await;
    }
}

/// Step 2 of the Create path: `run.buffers` must name exactly the
/// codespec's declared parameters, compared case-insensitively (spec.md
/// §4.4).
fn validate_buffer_names(codespec: &Codespec, buffers: &IndexMap<String, BufferId>) -> TygerResult<()> {
    let declared: std::collections::HashSet<String> =
        codespec.buffers.all_names().map(|n| n.to_ascii_lowercase()).collect();
    let supplied: std::collections::HashSet<String> =
        buffers.keys().map(|n| n.to_ascii_lowercase()).collect();
    if declared != supplied {
        return Err(TygerError::validation(format!(
            "run buffers {supplied:?} do not match codespec parameters {declared:?}"
        )));
    }
    Ok(())
}

async fn observe_loop<C: Clock, D: WorkloadDriver>(shared: Shared<C, D>, run_id: RunId) {
    let mut ticker = tokio::time::interval(OBSERVE_POLL_INTERVAL);
    loop {
        ticker.tick().await;

        let current = match shared.store.lock().get_run(run_id) {
            Ok(run) => run,
            Err(_) => return,
        };
        if current.is_final {
            return;
        }

        let obs = match shared.driver.observe(run_id).await {
            Ok(obs) => obs,
            Err(tyger_workload::WorkloadError::NotFound(_)) => return,
            Err(e) => {
                tracing::warn!(%run_id, error = %e, "observer: observe failed, will retry next tick");
                continue;
            }
        };

        if obs.running_pods != current.running_count {
            if let Err(e) = shared.store.lock().update_running_count(run_id, obs.running_pods) {
                tracing::warn!(%run_id, error = %e, "observer: failed to persist running pod count");
            }
        }

        let (derived, reason) = derive_status(&obs, current.cancel_requested());

        // A sole pod restarting can transiently regress Running -> Pending;
        // spec.md §4.4 says not to persist that (keep startedAt).
        if derived == RunStatus::Pending && current.status == RunStatus::Running {
            continue;
        }
        if derived == current.status {
            continue;
        }

        write_status_with_retry(&shared, run_id, current.version, derived, reason).await;

        if derived.is_terminal() {
            finalize(&shared, run_id).await;
            return;
        }
    }
}

async fn write_status_with_retry<C: Clock, D: WorkloadDriver>(
    shared: &Shared<C, D>,
    run_id: RunId,
    expected_version: u64,
    status: RunStatus,
    reason: Option<String>,
) {
    let mut expected = expected_version;
    for attempt in 0..2 {
        let result = { shared.store.lock().update_run_status(run_id, expected, status, reason.clone()) };
        match result {
            Ok(run) => {
                shared.subscribers.notify(&run);
                return;
            }
            Err(tyger_store::StoreError::VersionConflict { actual, .. }) if attempt == 0 => {
                expected = actual;
            }
            Err(e) => {
                tracing::warn!(%run_id, error = %e, "observer: failed to persist derived run status");
                return;
            }
        }
    }
}

/// The Finalization step of spec.md §4.4: archive logs with bounded
/// retry, commit `final=true`, then free the workload's cluster objects.
async fn finalize<C: Clock, D: WorkloadDriver>(shared: &Shared<C, D>, run_id: RunId) {
    let run = match shared.store.lock().get_run(run_id) {
        Ok(run) => run,
        Err(_) => return,
    };
    if run.is_final {
        return;
    }

    let content = shared.driver.list_logs(run_id, LogOptions::default()).await.unwrap_or_default();
    let mut backoff = Backoff::new(Duration::from_secs(1), shared.config.archive_backoff_cap);
    loop {
        match shared.archiver.archive(run_id, content.clone()).await {
            Ok(()) => break,
            Err(e) => {
                let delay = backoff.next_delay();
                tracing::warn!(%run_id, error = %e, delay_ms = delay.as_millis() as u64, "log archival attempt failed");
                if delay >= shared.config.archive_backoff_cap {
                    tracing::error!(%run_id, "log archival permanently failed; finalizing the run anyway");
                    break;
                }
                tokio::time::sleep(delay).await;
            }
        }
    }

    let archived_at_ms = shared.clock.epoch_ms();
    let version = shared.store.lock().get_run(run_id).map(|r| r.version).unwrap_or(run.version);
    match shared.store.lock().finalize_run(run_id, version, archived_at_ms) {
        Ok(finalized) => shared.subscribers.notify(&finalized),
        Err(e) => tracing::warn!(%run_id, error = %e, "finalize_run failed"),
    }

    shared.refresher.remove(run_id);
    let _ = shared.driver.delete_all(run_id).await;
}

#[async_trait]
impl<C: Clock + 'static, D: WorkloadDriver> ControlPlane for Engine<C, D> {
    async fn upsert_codespec(&self, name: String, draft: Codespec) -> TygerResult<Codespec> {
        self.resolver.upsert(name, draft)
    }

    async fn get_codespec(&self, reference: String) -> TygerResult<Codespec> {
        self.resolver.resolve(&reference)
    }

    async fn create_buffer(
        &self,
        tags: IndexMap<String, String>,
        active_lifetime_secs: Option<u64>,
    ) -> TygerResult<tyger_core::Buffer> {
        Ok(self.shared.store.lock().create_buffer(tags, active_lifetime_secs)?)
    }

    async fn buffer_access(&self, buffer_id: String, mode: AccessMode, external: bool) -> TygerResult<AccessGrant> {
        let buffer = self.shared.store.lock().get_buffer(&buffer_id)?;
        let now_ms = self.shared.clock.epoch_ms();
        Ok(self.shared.access.grant_access(&buffer, mode.into(), external, now_ms)?)
    }

    async fn create_run(&self, config: RunConfig) -> TygerResult<Run> {
        self.create_run_internal(config).await
    }

    async fn get_run(&self, id: RunId) -> TygerResult<Run> {
        Ok(self.shared.store.lock().get_run(id)?)
    }

    async fn cancel_run(&self, id: RunId) -> TygerResult<Run> {
        let run = {
            let mut store = self.shared.store.lock();
            let current = store.get_run(id)?;
            if current.status.is_terminal() || current.status == RunStatus::Canceling {
                current
            } else {
                store.update_run_status(id, current.version, RunStatus::Canceling, None)?
            }
        };
        self.shared.driver.cancel(id).await.map_err(TygerError::from)?;
        self.shared.subscribers.notify(&run);
        Ok(run)
    }

    async fn read_logs(&self, id: RunId, opts: LogFilterOptions) -> TygerResult<Vec<u8>> {
        let run = self.shared.store.lock().get_run(id)?;
        let live = if run.logs_archived_at_ms.is_none() {
            self.shared
                .driver
                .list_logs(id, LogOptions { include_timestamps: true, ..Default::default() })
                .await
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        Ok(self.shared.archiver.read(id, &opts, live).map_err(|e| TygerError::Internal(e.to_string()))?)
    }

    async fn list_runs(&self, cursor: Option<u64>, limit: usize) -> TygerResult<(Vec<Run>, Option<u64>)> {
        Ok(self.shared.store.lock().list_runs(cursor, limit))
    }

    async fn healthcheck(&self) -> TygerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
