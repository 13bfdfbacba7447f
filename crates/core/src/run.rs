// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifier and state machine.
//!
//! Shaped after `oj-core::job::{Job, StepStatus}` — a status enum with
//! `simple_display!`/terminal-state predicates, a `*Config`/`*ConfigBuilder`
//! pair built with `setters!`, and a top-level struct built with `builder!`
//! for tests — generalized from a single-agent job's step machine to
//! spec.md §3's Run attributes and status enumeration.

use crate::buffer::BufferId;
use crate::id::RunId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a run (spec.md §3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted, not yet resolved/provisioned.
    Pending,
    /// Workload is running (job and, if applicable, workers).
    Running,
    /// Job container exited zero and all workers were torn down cleanly.
    Succeeded,
    /// Job container exited non-zero, or provisioning/observation failed.
    Failed,
    /// Cancellation requested; teardown in progress.
    Canceling,
    /// Cancellation completed.
    Canceled,
}

impl RunStatus {
    /// A run in a terminal state will never transition again (spec.md §4.4).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed | RunStatus::Canceled)
    }

    /// A run whose cancellation has been requested, whether or not it has
    /// finished tearing down.
    pub fn is_canceling_or_canceled(&self) -> bool {
        matches!(self, RunStatus::Canceling | RunStatus::Canceled)
    }
}

crate::simple_display! {
    RunStatus {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Canceling => "canceling",
        Canceled => "canceled",
    }
}

/// Configuration supplied by the caller of `ControlPlane::create_run`
/// (spec.md §4.4 step 1), before the store assigns a [`RunId`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub codespec_ref: String,
    pub cluster: Option<String>,
    pub node_pool: Option<String>,
    pub buffers: IndexMap<String, BufferId>,
    pub worker_codespec_ref: Option<String>,
    pub worker_replicas: u32,
    pub tags: IndexMap<String, String>,
}

impl RunConfig {
    pub fn builder(codespec_ref: impl Into<String>) -> RunConfigBuilder {
        RunConfigBuilder {
            codespec_ref: codespec_ref.into(),
            cluster: None,
            node_pool: None,
            buffers: IndexMap::new(),
            worker_codespec_ref: None,
            worker_replicas: 0,
            tags: IndexMap::new(),
        }
    }
}

pub struct RunConfigBuilder {
    codespec_ref: String,
    cluster: Option<String>,
    node_pool: Option<String>,
    buffers: IndexMap<String, BufferId>,
    worker_codespec_ref: Option<String>,
    worker_replicas: u32,
    tags: IndexMap<String, String>,
}

impl RunConfigBuilder {
    crate::setters! {
        set {
            buffers: IndexMap<String, BufferId>,
            worker_replicas: u32,
            tags: IndexMap<String, String>,
        }
        option {
            cluster: String,
            node_pool: String,
            worker_codespec_ref: String,
        }
    }

    pub fn build(self) -> RunConfig {
        RunConfig {
            codespec_ref: self.codespec_ref,
            cluster: self.cluster,
            node_pool: self.node_pool,
            buffers: self.buffers,
            worker_codespec_ref: self.worker_codespec_ref,
            worker_replicas: self.worker_replicas,
            tags: self.tags,
        }
    }
}

/// A run instance (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub status: RunStatus,
    pub status_reason: Option<String>,
    pub codespec_ref: String,
    pub cluster: Option<String>,
    pub node_pool: Option<String>,
    pub buffers: IndexMap<String, BufferId>,
    pub worker_codespec_ref: Option<String>,
    pub worker_replicas: u32,
    /// Number of pods currently observed running for this run's job/workers
    /// (spec.md §3), refreshed from the workload driver's last observation.
    #[serde(default)]
    pub running_count: u32,
    pub tags: IndexMap<String, String>,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
    /// Set by the Log Archiver once it has durably written the run's logs
    /// (spec.md §4.7). `final=true` implies this is set (spec.md §3).
    #[serde(default)]
    pub logs_archived_at_ms: Option<u64>,
    /// Optimistic-concurrency version, bumped on every store mutation
    /// (spec.md §4.2).
    #[serde(default)]
    pub version: u64,
    /// Set once a terminal status has been durably recorded; after this,
    /// no further status transition is accepted (spec.md's "final=true
    /// immutability" invariant).
    #[serde(default)]
    pub is_final: bool,
}

impl Run {
    pub fn new(id: RunId, config: RunConfig, created_at_ms: u64) -> Self {
        Self {
            id,
            status: RunStatus::Pending,
            status_reason: None,
            codespec_ref: config.codespec_ref,
            cluster: config.cluster,
            node_pool: config.node_pool,
            buffers: config.buffers,
            worker_codespec_ref: config.worker_codespec_ref,
            worker_replicas: config.worker_replicas,
            running_count: 0,
            tags: config.tags,
            created_at_ms,
            started_at_ms: None,
            finished_at_ms: None,
            logs_archived_at_ms: None,
            version: 0,
            is_final: false,
        }
    }

    /// True once cancellation has been requested and cannot be undone.
    pub fn cancel_requested(&self) -> bool {
        self.status.is_canceling_or_canceled()
    }

    pub fn has_workers(&self) -> bool {
        self.worker_codespec_ref.is_some() && self.worker_replicas > 0
    }
}

crate::builder! {
    pub struct RunBuilder => Run {
        into {
            codespec_ref: String = "echo/versions/1",
        }
        set {
            id: RunId = RunId::new(1),
            status: RunStatus = RunStatus::Pending,
            buffers: IndexMap<String, BufferId> = IndexMap::new(),
            worker_replicas: u32 = 0,
            running_count: u32 = 0,
            tags: IndexMap<String, String> = IndexMap::new(),
            created_at_ms: u64 = 0,
            version: u64 = 0,
            is_final: bool = false,
        }
        option {
            status_reason: String = None,
            cluster: String = None,
            node_pool: String = None,
            worker_codespec_ref: String = None,
            started_at_ms: u64 = None,
            finished_at_ms: u64 = None,
            logs_archived_at_ms: u64 = None,
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
