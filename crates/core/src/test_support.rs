// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{BufferId, Codespec, CodespecKind, Run, RunConfig, RunId, RunStatus};
use indexmap::IndexMap;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::run::RunStatus;
    use proptest::prelude::*;

    pub fn arb_run_status() -> impl Strategy<Value = RunStatus> {
        prop_oneof![
            Just(RunStatus::Pending),
            Just(RunStatus::Running),
            Just(RunStatus::Succeeded),
            Just(RunStatus::Failed),
            Just(RunStatus::Canceling),
            Just(RunStatus::Canceled),
        ]
    }
}

// ── Fixture factory functions ────────────────────────────────────────────

/// A minimal valid job codespec named `name`.
pub fn job_codespec(name: &str, image: &str) -> Codespec {
    Codespec::builder().name(name).image(image).kind(CodespecKind::Job).build()
}

/// A minimal valid worker codespec named `name`.
pub fn worker_codespec(name: &str, image: &str) -> Codespec {
    Codespec::builder().name(name).image(image).kind(CodespecKind::Worker).build()
}

/// A run in [`RunStatus::Pending`] referencing `codespec_ref`, created at
/// `created_at_ms`.
pub fn pending_run(id: u64, codespec_ref: &str, created_at_ms: u64) -> Run {
    let config = RunConfig::builder(codespec_ref).build();
    Run::new(RunId::new(id), config, created_at_ms)
}

/// A run with one named input buffer and one named output buffer.
pub fn run_with_buffers(
    id: u64,
    codespec_ref: &str,
    input_name: &str,
    input_id: BufferId,
    output_name: &str,
    output_id: BufferId,
    created_at_ms: u64,
) -> Run {
    let mut buffers = IndexMap::new();
    buffers.insert(input_name.to_string(), input_id);
    buffers.insert(output_name.to_string(), output_id);
    let config = RunConfig::builder(codespec_ref).buffers(buffers).build();
    Run::new(RunId::new(id), config, created_at_ms)
}

/// Advance `run`'s status in place, bumping its optimistic-concurrency
/// version. Mirrors `PersistentStore::update_run_status`: reaching a
/// terminal status does not by itself mark the run final — call
/// [`finalize`] for that (spec.md §4.4's Finalization step).
pub fn transition(run: &mut Run, status: RunStatus) {
    run.status = status;
    run.version += 1;
}

/// Mark `run` final with the given `logsArchivedAt`, mirroring
/// `PersistentStore::finalize_run`.
pub fn finalize(run: &mut Run, logs_archived_at_ms: u64) {
    run.logs_archived_at_ms = Some(logs_archived_at_ms);
    run.is_final = true;
    run.version += 1;
}
