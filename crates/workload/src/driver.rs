// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Workload Driver abstraction (spec.md §4.3): an interface over two
//! backends — a container orchestrator and a single-host container daemon
//! — that creates, inspects, lists, and deletes the job/pod objects a run
//! needs, all labeled with the run id.
//!
//! Grounded on `oj_daemon::adapters::agent::AgentAdapter`: an
//! `#[async_trait]` object-safe trait with a matching `*Error` enum and
//! per-id operations, generalized from single-agent-process management to
//! job/worker/observe/logs/cancel/delete/list operations.

use crate::error::WorkloadResult;
use async_trait::async_trait;
use indexmap::IndexMap;
use tyger_core::{Codespec, RunId};

/// What `WD.launchJob`/`launchWorker` pass through to the container: plain
/// env vars plus a secret map of per-parameter buffer-access credentials,
/// keyed by parameter name (spec.md §4.4 step 5).
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub run_id: RunId,
    pub codespec: Codespec,
    pub env: IndexMap<String, String>,
    pub secret_map: IndexMap<String, String>,
    pub target: String,
}

/// Handle(s) to whatever the driver created for a `launchJob`/
/// `launchWorker` call, for logging/debugging — the authoritative record
/// lives in the Persistent Store, not here.
#[derive(Debug, Clone, Default)]
pub struct CreatedObjects {
    pub ids: Vec<String>,
}

/// One `observe` event: the raw shape the Run Lifecycle Engine's
/// derivation rules (spec.md §4.3) consume to compute a `RunStatus`.
#[derive(Debug, Clone, Default)]
pub struct WorkloadObservation {
    pub job_succeeded: bool,
    pub job_failed: bool,
    pub failure_reason: Option<String>,
    pub backoff_limit_exceeded: bool,
    pub running_pods: u32,
    pub pending_pods: u32,
    pub pods_have_deletion_timestamp: bool,
    pub all_pods_deleted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub include_timestamps: bool,
    pub since_time_ms: Option<u64>,
    pub tail_lines: Option<u32>,
    pub follow: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LabelPage {
    pub run_ids: Vec<RunId>,
    pub continuation: Option<String>,
}

/// Abstract interface over a workload backend (spec.md §4.3).
///
/// Implementations must label every created object `tyger-run=<id>` plus
/// either `tyger-job=<id>` or `tyger-worker=<id>`, and attach
/// [`crate::labels::FINALIZER`] to every pod, removing it only once the
/// Log Archiver has read that pod.
#[async_trait]
pub trait WorkloadDriver: Send + Sync + 'static {
    async fn launch_job(&self, request: LaunchRequest) -> WorkloadResult<CreatedObjects>;

    async fn launch_worker(
        &self,
        request: LaunchRequest,
        replicas: u32,
    ) -> WorkloadResult<CreatedObjects>;

    async fn observe(&self, run_id: RunId) -> WorkloadResult<WorkloadObservation>;

    async fn list_logs(&self, run_id: RunId, opts: LogOptions) -> WorkloadResult<Vec<u8>>;

    /// Idempotent: terminates the job (not the pods — pods are preserved
    /// until the Log Archiver reads them). Absence of the job is not an
    /// error (spec.md §4.3).
    async fn cancel(&self, run_id: RunId) -> WorkloadResult<()>;

    /// Idempotent: deletes every object labeled with `run_id`.
    async fn delete_all(&self, run_id: RunId) -> WorkloadResult<()>;

    /// Push re-minted buffer-access credentials into the run's secret
    /// object (spec.md §4.8): patch the `Secret`, write new files into a
    /// tmpfs mount, or reload env vars, depending on the backend. Keyed
    /// by parameter name, idempotent, `NotFound` if the run's secret
    /// object no longer exists (the run has already torn down).
    async fn refresh_secret(
        &self,
        run_id: RunId,
        secret_map: IndexMap<String, String>,
    ) -> WorkloadResult<()>;

    async fn list_by_label(
        &self,
        label: &str,
        continuation: Option<String>,
    ) -> WorkloadResult<LabelPage>;
}

/// Apply the observe → status derivation rules from spec.md §4.3.
///
/// Shared by every driver's caller (the Run Lifecycle Engine observer
/// loop) rather than duplicated per backend, since the rules are backend
/// agnostic once reduced to a [`WorkloadObservation`].
pub fn derive_status(obs: &WorkloadObservation, canceling: bool) -> (tyger_core::RunStatus, Option<String>) {
    use tyger_core::RunStatus;

    if obs.job_succeeded {
        return (RunStatus::Succeeded, None);
    }
    if obs.job_failed || obs.backoff_limit_exceeded {
        return (RunStatus::Failed, obs.failure_reason.clone());
    }
    if canceling && obs.all_pods_deleted {
        return (RunStatus::Canceled, None);
    }
    if canceling && obs.pods_have_deletion_timestamp {
        return (RunStatus::Canceling, None);
    }
    if obs.running_pods > 0 {
        return (RunStatus::Running, None);
    }
    (RunStatus::Pending, None)
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
