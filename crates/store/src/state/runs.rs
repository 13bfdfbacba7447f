// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run event handlers.

use super::MaterializedState;
use crate::event::Event;
use tyger_core::{Run, RunConfig, RunStatus};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::RunCreated {
            id,
            codespec_ref,
            cluster,
            node_pool,
            buffers,
            worker_codespec_ref,
            worker_replicas,
            tags,
            created_at_ms,
        } => {
            // Idempotency: a replayed create for a run already present is a no-op.
            if state.runs.contains_key(&id.value()) {
                return;
            }
            let mut config = RunConfig::builder(codespec_ref.clone())
                .buffers(buffers.clone())
                .worker_replicas(*worker_replicas)
                .tags(tags.clone());
            if let Some(cluster) = cluster {
                config = config.cluster(cluster.clone());
            }
            if let Some(node_pool) = node_pool {
                config = config.node_pool(node_pool.clone());
            }
            if let Some(worker_ref) = worker_codespec_ref {
                config = config.worker_codespec_ref(worker_ref.clone());
            }
            let run = Run::new(*id, config.build(), *created_at_ms);
            state.runs.insert(id.value(), run);
        }

        Event::RunStatusChanged { id, status, status_reason, epoch_ms } => {
            if let Some(run) = state.runs.get_mut(&id.value()) {
                // Idempotency + monotonicity: once a run reaches a terminal
                // status, no further status transition is accepted — only
                // `RunFinalized` may touch it from here (spec.md §4.4's
                // Finalization step owns `is_final`).
                if run.is_final || run.status.is_terminal() {
                    return;
                }
                if run.status == *status && run.status_reason == *status_reason {
                    return;
                }
                run.status = *status;
                run.status_reason.clone_from(status_reason);
                if run.started_at_ms.is_none() && *status == RunStatus::Running {
                    run.started_at_ms = Some(*epoch_ms);
                }
                if status.is_terminal() {
                    run.finished_at_ms.get_or_insert(*epoch_ms);
                }
                run.version += 1;
            }
        }

        Event::RunFinalized { id, logs_archived_at_ms, epoch_ms } => {
            if let Some(run) = state.runs.get_mut(&id.value()) {
                // Idempotent: a second finalization (e.g. observer and
                // sweeper racing, spec.md §5) is a no-op.
                if run.is_final {
                    return;
                }
                run.logs_archived_at_ms = Some(*logs_archived_at_ms);
                run.finished_at_ms.get_or_insert(*epoch_ms);
                run.is_final = true;
                run.version += 1;
            }
        }

        Event::RunRunningCountChanged { id, running_count } => {
            if let Some(run) = state.runs.get_mut(&id.value()) {
                run.running_count = *running_count;
            }
        }

        _ => {}
    }
}
