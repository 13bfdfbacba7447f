// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Label and naming conventions shared by every [`crate::WorkloadDriver`]
//! implementation (spec.md §4.3/§6). Grounded on the teacher's
//! `app=oj-agent`/`oj.dev/agent-id` pod-labeling convention in
//! `k8s::pod::build_pod`, generalized to Tyger's run/job/worker label set.

pub const LABEL_RUN: &str = "tyger-run";
pub const LABEL_JOB: &str = "tyger-job";
pub const LABEL_WORKER: &str = "tyger-worker";

/// Removed by the driver at delete time, after the Log Archiver has read
/// the pod (spec.md §4.3/§4.7).
pub const FINALIZER: &str = "research.microsoft.com/tyger-finalizer";

pub fn job_name(run_id: tyger_core::RunId) -> String {
    format!("run-{run_id}-job")
}

pub fn worker_name(run_id: tyger_core::RunId) -> String {
    format!("run-{run_id}-worker")
}

pub fn secret_name(run_id: tyger_core::RunId) -> String {
    format!("run-{run_id}")
}
