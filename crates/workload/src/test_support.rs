// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake [`WorkloadDriver`] for deterministic testing, gated behind the
//! `test-support` feature so downstream crates (notably `tyger-lifecycle`)
//! can exercise run-lifecycle logic without a real cluster or Docker
//! daemon.
//!
//! Grounded on `oj_adapters::agent::FakeAgentAdapter`: a `Mutex`-guarded
//! inner state, recorded calls, and programmable per-method errors.

use crate::driver::{CreatedObjects, LabelPage, LaunchRequest, LogOptions, WorkloadDriver, WorkloadObservation};
use crate::error::{WorkloadError, WorkloadResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tyger_core::RunId;

/// Recorded call to [`FakeDriver`], for assertions in caller tests.
#[derive(Debug, Clone)]
pub enum DriverCall {
    LaunchJob(RunId),
    LaunchWorker(RunId, u32),
    Observe(RunId),
    ListLogs(RunId),
    Cancel(RunId),
    DeleteAll(RunId),
    RefreshSecret(RunId),
}

struct FakeRun {
    observation: WorkloadObservation,
    canceling: bool,
    deleted: bool,
    secret_map: IndexMap<String, String>,
}

struct Inner {
    runs: HashMap<RunId, FakeRun>,
    calls: Vec<DriverCall>,
    launch_error: Option<WorkloadError>,
}

/// In-memory [`WorkloadDriver`]. Every run starts `Pending`
/// ([`WorkloadObservation::default`]); tests drive it forward by calling
/// [`FakeDriver::set_observation`].
#[derive(Clone)]
pub struct FakeDriver {
    inner: Arc<Mutex<Inner>>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { runs: HashMap::new(), calls: Vec::new(), launch_error: None })) }
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.inner.lock().calls.clone()
    }

    pub fn set_launch_error(&self, error: WorkloadError) {
        self.inner.lock().launch_error = Some(error);
    }

    pub fn set_observation(&self, run_id: RunId, observation: WorkloadObservation) {
        let mut inner = self.inner.lock();
        let run = inner.runs.entry(run_id).or_insert_with(|| FakeRun {
            observation: WorkloadObservation::default(),
            canceling: false,
            deleted: false,
            secret_map: IndexMap::new(),
        });
        run.observation = observation;
    }

    pub fn is_canceling(&self, run_id: RunId) -> bool {
        self.inner.lock().runs.get(&run_id).map(|r| r.canceling).unwrap_or(false)
    }

    pub fn is_deleted(&self, run_id: RunId) -> bool {
        self.inner.lock().runs.get(&run_id).map(|r| r.deleted).unwrap_or(true)
    }

    pub fn secret_map(&self, run_id: RunId) -> IndexMap<String, String> {
        self.inner.lock().runs.get(&run_id).map(|r| r.secret_map.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WorkloadDriver for FakeDriver {
    async fn launch_job(&self, request: LaunchRequest) -> WorkloadResult<CreatedObjects> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::LaunchJob(request.run_id));
        if let Some(error) = inner.launch_error.take() {
            return Err(error);
        }
        if inner.runs.contains_key(&request.run_id) {
            return Err(WorkloadError::ConflictExists);
        }
        inner.runs.insert(
            request.run_id,
            FakeRun {
                observation: WorkloadObservation::default(),
                canceling: false,
                deleted: false,
                secret_map: IndexMap::new(),
            },
        );
        Ok(CreatedObjects { ids: vec![format!("run-{}-job", request.run_id)] })
    }

    async fn launch_worker(&self, request: LaunchRequest, replicas: u32) -> WorkloadResult<CreatedObjects> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::LaunchWorker(request.run_id, replicas));
        if let Some(error) = inner.launch_error.take() {
            return Err(error);
        }
        inner.runs.entry(request.run_id).or_insert_with(|| FakeRun {
            observation: WorkloadObservation::default(),
            canceling: false,
            deleted: false,
            secret_map: IndexMap::new(),
        });
        Ok(CreatedObjects { ids: (0..replicas).map(|i| format!("run-{}-worker-{i}", request.run_id)).collect() })
    }

    async fn observe(&self, run_id: RunId) -> WorkloadResult<WorkloadObservation> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Observe(run_id));
        inner
            .runs
            .get(&run_id)
            .map(|r| r.observation.clone())
            .ok_or_else(|| WorkloadError::NotFound(run_id.to_string()))
    }

    async fn list_logs(&self, run_id: RunId, _opts: LogOptions) -> WorkloadResult<Vec<u8>> {
        self.inner.lock().calls.push(DriverCall::ListLogs(run_id));
        Ok(Vec::new())
    }

    async fn cancel(&self, run_id: RunId) -> WorkloadResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Cancel(run_id));
        if let Some(run) = inner.runs.get_mut(&run_id) {
            run.canceling = true;
        }
        Ok(())
    }

    async fn delete_all(&self, run_id: RunId) -> WorkloadResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::DeleteAll(run_id));
        if let Some(run) = inner.runs.get_mut(&run_id) {
            run.deleted = true;
        }
        Ok(())
    }

    async fn refresh_secret(&self, run_id: RunId, secret_map: IndexMap<String, String>) -> WorkloadResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::RefreshSecret(run_id));
        let run = inner.runs.get_mut(&run_id).ok_or_else(|| WorkloadError::NotFound(run_id.to_string()))?;
        run.secret_map = secret_map;
        Ok(())
    }

    async fn list_by_label(&self, _label: &str, _continuation: Option<String>) -> WorkloadResult<LabelPage> {
        let inner = self.inner.lock();
        let mut run_ids: Vec<RunId> = inner.runs.keys().copied().collect();
        run_ids.sort_unstable();
        Ok(LabelPage { run_ids, continuation: None })
    }
}

#[cfg(test)]
#[path = "test_support_tests.rs"]
mod tests;
