// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable events: the only things the WAL ever stores. State is always
//! derived from events, never written to directly (spec.md §4.2).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tyger_core::{BufferId, CodespecKind, Resources, RunId, RunStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    CodespecUpserted {
        name: String,
        version: u32,
        kind: CodespecKind,
        image: String,
        command: Vec<String>,
        args: Vec<String>,
        env: IndexMap<String, String>,
        working_dir: Option<String>,
        resources: Resources,
        buffer_inputs: Vec<String>,
        buffer_outputs: Vec<String>,
    },

    RunCreated {
        id: RunId,
        codespec_ref: String,
        cluster: Option<String>,
        node_pool: Option<String>,
        buffers: IndexMap<String, BufferId>,
        worker_codespec_ref: Option<String>,
        worker_replicas: u32,
        tags: IndexMap<String, String>,
        created_at_ms: u64,
    },

    /// A status transition. `expected_version` carries the optimistic
    /// concurrency token the caller observed; appended to the WAL only
    /// after the store has validated it against in-memory state, so replay
    /// always sees consistent transitions (spec.md §4.2).
    RunStatusChanged {
        id: RunId,
        status: RunStatus,
        status_reason: Option<String>,
        epoch_ms: u64,
    },

    /// The Finalization step of spec.md §4.4: sets `logsArchivedAt` and
    /// `final=true` in one commit, once the run has reached a terminal
    /// status and the Log Archiver has durably written its logs.
    RunFinalized {
        id: RunId,
        logs_archived_at_ms: u64,
        epoch_ms: u64,
    },

    /// Refreshed pod-running count from the workload driver's last
    /// observation (spec.md §3's `runningCount`). Only appended when the
    /// count actually changes, so a steady-state run doesn't grow the WAL
    /// on every observer poll tick.
    RunRunningCountChanged {
        id: RunId,
        running_count: u32,
    },

    BufferCreated {
        id: BufferId,
        tags: IndexMap<String, String>,
        active_lifetime_secs: Option<u64>,
        created_at_ms: u64,
    },

    BufferSoftDeleted {
        id: BufferId,
        epoch_ms: u64,
    },

    /// Control event marking a clean daemon shutdown. Does not affect
    /// materialized state; the daemon's replay loop skips it (same role as
    /// the teacher's `Event::Shutdown`).
    Shutdown,
}
