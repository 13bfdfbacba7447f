// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Persistent Store (spec.md §4.2): a transactional facade over the
//! WAL and materialized state, owning codespec versioning, Run id
//! assignment, and optimistic-concurrency run updates.

use crate::error::{StoreError, StoreResult};
use crate::event::Event;
use crate::migration::MigrationRegistry;
use crate::snapshot;
use crate::state::MaterializedState;
use crate::wal::Wal;
use std::path::{Path, PathBuf};
use tyger_core::{
    Buffer, BufferId, Clock, Codespec, CodespecRef, Run, RunConfig, RunId, RunStatus, TygerError,
};

/// WAL entries accumulated since the last snapshot before
/// [`PersistentStore::maybe_snapshot`] takes a new one and truncates.
const SNAPSHOT_EVERY_N_ENTRIES: u64 = 1_000;

pub struct PersistentStore<C: Clock> {
    wal: Wal,
    state: MaterializedState,
    clock: C,
    snapshot_path: PathBuf,
    migrations: MigrationRegistry,
    next_run_id: u64,
    last_snapshot_seq: u64,
}

impl<C: Clock> PersistentStore<C> {
    /// Open (or create) the store backing files, replaying the WAL on top
    /// of the most recent snapshot.
    pub fn open(
        wal_path: impl AsRef<Path>,
        snapshot_path: impl AsRef<Path>,
        clock: C,
    ) -> StoreResult<Self> {
        let migrations = MigrationRegistry::new();
        let snapshot_path = snapshot_path.as_ref().to_path_buf();

        let (snapshot_seq, mut state) = match snapshot::load(&snapshot_path, &migrations)? {
            Some((seq, state)) => (seq, state),
            None => (0, MaterializedState::default()),
        };

        let mut wal = Wal::open(wal_path, snapshot_seq)?;
        while let Some(entry) = wal.next_unprocessed()? {
            state.apply_event(&entry.event);
            wal.mark_processed(entry.seq);
        }

        let next_run_id = state.runs.keys().max().copied().unwrap_or(0) + 1;

        Ok(Self {
            wal,
            state,
            clock,
            snapshot_path,
            migrations,
            next_run_id,
            last_snapshot_seq: snapshot_seq,
        })
    }

    fn append(&mut self, event: Event) -> StoreResult<()> {
        let seq = self.wal.append(&event)?;
        self.state.apply_event(&event);
        self.wal.mark_processed(seq);
        Ok(())
    }

    // ── Codespecs (spec.md §4.1) ─────────────────────────────────────────

    /// Upsert a codespec: if its content matches the current latest
    /// version verbatim, that version is returned unchanged; otherwise a
    /// new version is assigned and durably recorded.
    pub fn upsert_codespec(&mut self, draft: Codespec) -> StoreResult<Codespec> {
        draft.validate().map_err(|e| StoreError::Validation(e.to_string()))?;

        if let Some(latest) = self.state.get_codespec(&draft.name, None) {
            if latest.content_equals(&draft) {
                return Ok(latest.clone());
            }
        }

        let version = self.state.latest_codespec_version(&draft.name).map_or(1, |v| v + 1);
        self.append(Event::CodespecUpserted {
            name: draft.name.clone(),
            version,
            kind: draft.kind,
            image: draft.image,
            command: draft.command,
            args: draft.args,
            env: draft.env,
            working_dir: draft.working_dir,
            resources: draft.resources,
            buffer_inputs: draft.buffers.inputs.into_iter().collect(),
            buffer_outputs: draft.buffers.outputs.into_iter().collect(),
        })?;

        Ok(self.state.get_codespec(&draft.name, Some(version)).cloned().expect("just inserted"))
    }

    pub fn get_codespec(&self, reference: &str) -> StoreResult<Codespec> {
        let parsed = CodespecRef::parse(reference).map_err(|e| StoreError::Validation(e.to_string()))?;
        self.state.get_codespec(&parsed.name, parsed.version).cloned().ok_or_else(|| {
            match (parsed.version, self.state.latest_codespec_version(&parsed.name)) {
                (Some(_), Some(latest)) => StoreError::NotFound(format!(
                    "codespec {reference:?}: no such version, the latest known version is {latest}"
                )),
                _ => StoreError::NotFound(format!("codespec {reference:?}")),
            }
        })
    }

    // ── Runs (spec.md §4.2, §4.4) ────────────────────────────────────────

    pub fn create_run(&mut self, config: RunConfig) -> StoreResult<Run> {
        let id = RunId::new(self.next_run_id);
        self.next_run_id += 1;
        self.append(Event::RunCreated {
            id,
            codespec_ref: config.codespec_ref,
            cluster: config.cluster,
            node_pool: config.node_pool,
            buffers: config.buffers,
            worker_codespec_ref: config.worker_codespec_ref,
            worker_replicas: config.worker_replicas,
            tags: config.tags,
            created_at_ms: self.clock.epoch_ms(),
        })?;
        Ok(self.state.get_run(id.value()).cloned().expect("just inserted"))
    }

    pub fn get_run(&self, id: RunId) -> StoreResult<Run> {
        self.state.get_run(id.value()).cloned().ok_or_else(|| StoreError::NotFound(format!("run {id}")))
    }

    /// Transition `id` to `status`, enforcing optimistic concurrency
    /// against `expected_version` (spec.md §4.2: on a version mismatch the
    /// caller should re-read and retry exactly once).
    pub fn update_run_status(
        &mut self,
        id: RunId,
        expected_version: u64,
        status: RunStatus,
        reason: Option<String>,
    ) -> StoreResult<Run> {
        let current = self.get_run(id)?;
        if current.is_final || current.status.is_terminal() {
            return Err(StoreError::Validation(format!("run {id} has already reached a terminal state")));
        }
        if current.version != expected_version {
            return Err(StoreError::VersionConflict { expected: expected_version, actual: current.version });
        }
        self.append(Event::RunStatusChanged {
            id,
            status,
            status_reason: reason,
            epoch_ms: self.clock.epoch_ms(),
        })?;
        self.get_run(id)
    }

    /// The Finalization step of spec.md §4.4: commits `logsArchivedAt` and
    /// `final=true` together, once the Log Archiver has durably written
    /// the run's logs. Idempotent — a run that is already final is
    /// returned unchanged (spec.md §8 property 2: "subsequent sweeps are
    /// no-ops"), so both the observer and the sweeper may race to call
    /// this for the same run.
    pub fn finalize_run(&mut self, id: RunId, expected_version: u64, logs_archived_at_ms: u64) -> StoreResult<Run> {
        let current = self.get_run(id)?;
        if current.is_final {
            return Ok(current);
        }
        if !current.status.is_terminal() {
            return Err(StoreError::Validation(format!("run {id} is not in a terminal status")));
        }
        if current.version != expected_version {
            return Err(StoreError::VersionConflict { expected: expected_version, actual: current.version });
        }
        self.append(Event::RunFinalized { id, logs_archived_at_ms, epoch_ms: self.clock.epoch_ms() })?;
        self.get_run(id)
    }

    /// Refresh `runningCount` from the workload driver's last observation
    /// (spec.md §3). A no-op (no WAL append) when the count hasn't
    /// changed, so a steady-state run's periodic observer poll doesn't
    /// grow the WAL. Unlike [`update_run_status`](Self::update_run_status)
    /// this isn't a state transition, so it carries no optimistic
    /// concurrency check.
    pub fn update_running_count(&mut self, id: RunId, running_count: u32) -> StoreResult<Run> {
        let current = self.get_run(id)?;
        if current.running_count == running_count {
            return Ok(current);
        }
        self.append(Event::RunRunningCountChanged { id, running_count })?;
        self.get_run(id)
    }

    /// List runs by ascending id, `limit` at a time, returning the cursor
    /// to pass back in for the next page (spec.md §6's `listRuns`).
    pub fn list_runs(&self, cursor: Option<u64>, limit: usize) -> (Vec<Run>, Option<u64>) {
        let mut ids: Vec<u64> = self
            .state
            .runs
            .keys()
            .copied()
            .filter(|id| match cursor {
                Some(c) => *id > c,
                None => true,
            })
            .collect();
        ids.sort_unstable();
        let next_cursor = if ids.len() > limit { ids.get(limit - 1).copied() } else { None };
        ids.truncate(limit);
        let runs = ids.into_iter().map(|id| self.state.runs[&id].clone()).collect();
        (runs, next_cursor)
    }

    // ── Buffers (spec.md §4.2) ───────────────────────────────────────────

    pub fn create_buffer(&mut self, tags: indexmap::IndexMap<String, String>, active_lifetime_secs: Option<u64>) -> StoreResult<Buffer> {
        let id = BufferId::new();
        self.append(Event::BufferCreated {
            id,
            tags,
            active_lifetime_secs,
            created_at_ms: self.clock.epoch_ms(),
        })?;
        Ok(self.state.get_buffer(id.as_str()).cloned().expect("just inserted"))
    }

    pub fn get_buffer(&self, id: &str) -> StoreResult<Buffer> {
        self.state.get_buffer(id).cloned().ok_or_else(|| StoreError::NotFound(format!("buffer {id:?}")))
    }

    pub fn soft_delete_buffer(&mut self, id: BufferId) -> StoreResult<Buffer> {
        self.get_buffer(id.as_str())?;
        self.append(Event::BufferSoftDeleted { id, epoch_ms: self.clock.epoch_ms() })?;
        self.get_buffer(id.as_str())
    }

    // ── Maintenance ───────────────────────────────────────────────────────

    /// Take a snapshot and truncate the WAL if enough entries have
    /// accumulated since the last one. Returns whether a snapshot was
    /// taken.
    pub fn maybe_snapshot(&mut self) -> StoreResult<bool> {
        let processed = self.wal.processed_seq();
        if processed.saturating_sub(self.last_snapshot_seq) < SNAPSHOT_EVERY_N_ENTRIES {
            return Ok(false);
        }
        snapshot::save(&self.snapshot_path, processed, &self.state)?;
        self.wal.truncate_before(processed + 1)?;
        self.last_snapshot_seq = processed;
        tracing::info!(seq = processed, "took persistent store snapshot");
        Ok(true)
    }

    pub fn flush(&mut self) -> StoreResult<()> {
        self.wal.flush()
    }

    /// Register an additional snapshot migration, e.g. during startup
    /// before the first `open` on an existing data directory after a
    /// `MaterializedState` shape change.
    pub fn register_migration(&mut self, migration: Box<dyn crate::migration::Migration>) {
        self.migrations.register(migration);
    }
}

impl From<TygerError> for StoreError {
    fn from(err: TygerError) -> Self {
        match err {
            TygerError::Validation(msg) => StoreError::Validation(msg),
            TygerError::NotFound(msg) => StoreError::NotFound(msg),
            TygerError::PreconditionFailed(msg) => StoreError::Validation(msg),
            TygerError::Internal(msg) => StoreError::Validation(msg),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
