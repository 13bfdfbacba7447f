// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;
use tyger_core::{Codespec, FakeClock, RunStatus};

fn open_store(dir: &std::path::Path) -> PersistentStore<FakeClock> {
    PersistentStore::open(dir.join("tyger.wal"), dir.join("tyger.snapshot"), FakeClock::new()).unwrap()
}

#[test]
fn upsert_codespec_assigns_version_one_on_first_insert() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let spec = Codespec::builder().name("echo").build();
    let stored = store.upsert_codespec(spec).unwrap();

    assert_eq!(stored.version, 1);
}

#[test]
fn upsert_codespec_with_identical_content_does_not_bump_version() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let spec = Codespec::builder().name("echo").image("x:1").build();
    let v1 = store.upsert_codespec(spec.clone()).unwrap();
    let v1_again = store.upsert_codespec(spec).unwrap();

    assert_eq!(v1.version, 1);
    assert_eq!(v1_again.version, 1);
}

#[test]
fn upsert_codespec_with_changed_content_bumps_version() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    store.upsert_codespec(Codespec::builder().name("echo").image("x:1").build()).unwrap();
    let v2 = store.upsert_codespec(Codespec::builder().name("echo").image("x:2").build()).unwrap();

    assert_eq!(v2.version, 2);
}

#[test]
fn get_codespec_resolves_unversioned_reference_to_latest() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    store.upsert_codespec(Codespec::builder().name("echo").image("x:1").build()).unwrap();
    store.upsert_codespec(Codespec::builder().name("echo").image("x:2").build()).unwrap();

    let latest = store.get_codespec("echo").unwrap();
    assert_eq!(latest.version, 2);

    let pinned = store.get_codespec("echo/versions/1").unwrap();
    assert_eq!(pinned.image, "x:1");
}

#[test]
fn get_codespec_missing_returns_not_found() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    assert!(matches!(store.get_codespec("nope"), Err(StoreError::NotFound(_))));
}

#[test]
fn get_codespec_missing_version_names_the_latest_known_version() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    store.upsert_codespec(Codespec::builder().name("echo").image("x:1").build()).unwrap();
    store.upsert_codespec(Codespec::builder().name("echo").image("x:2").build()).unwrap();

    let err = store.get_codespec("echo/versions/99").unwrap_err();
    let StoreError::NotFound(msg) = err else { panic!("expected NotFound, got {err:?}") };
    assert!(msg.contains("the latest known version is 2"), "message was: {msg}");
}

#[test]
fn create_run_assigns_monotonically_increasing_ids() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let r1 = store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
    let r2 = store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();

    assert_eq!(r2.id.value(), r1.id.value() + 1);
}

#[test]
fn update_run_status_with_correct_version_succeeds() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let run = store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
    let updated = store.update_run_status(run.id, run.version, RunStatus::Running, None).unwrap();

    assert_eq!(updated.status, RunStatus::Running);
    assert_eq!(updated.version, run.version + 1);
}

#[test]
fn update_run_status_with_stale_version_is_rejected() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let run = store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
    store.update_run_status(run.id, run.version, RunStatus::Running, None).unwrap();

    let result = store.update_run_status(run.id, run.version, RunStatus::Succeeded, None);
    assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
}

#[test]
fn update_run_status_after_terminal_is_rejected() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let run = store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
    let running = store.update_run_status(run.id, run.version, RunStatus::Running, None).unwrap();
    let done = store.update_run_status(running.id, running.version, RunStatus::Succeeded, None).unwrap();
    assert!(!done.is_final, "terminal status alone does not finalize the run");

    let result = store.update_run_status(done.id, done.version, RunStatus::Failed, None);
    assert!(matches!(result, Err(StoreError::Validation(_))));
}

#[test]
fn finalize_run_sets_logs_archived_and_final() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let run = store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
    let done = store.update_run_status(run.id, run.version, RunStatus::Succeeded, None).unwrap();

    let finalized = store.finalize_run(done.id, done.version, 42_000).unwrap();
    assert!(finalized.is_final);
    assert_eq!(finalized.logs_archived_at_ms, Some(42_000));
}

#[test]
fn finalize_run_rejects_non_terminal_runs() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let run = store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
    let result = store.finalize_run(run.id, run.version, 1_000);
    assert!(matches!(result, Err(StoreError::Validation(_))));
}

#[test]
fn finalize_run_is_idempotent_once_final() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let run = store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
    let done = store.update_run_status(run.id, run.version, RunStatus::Succeeded, None).unwrap();
    let finalized = store.finalize_run(done.id, done.version, 42_000).unwrap();

    // A second finalize (e.g. the sweeper racing the observer) is a no-op,
    // even with a stale version token.
    let again = store.finalize_run(finalized.id, finalized.version, 99_000).unwrap();
    assert_eq!(again.logs_archived_at_ms, Some(42_000));
    assert_eq!(again.version, finalized.version);
}

#[test]
fn update_running_count_persists_and_is_idempotent_on_no_change() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let run = store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
    assert_eq!(run.running_count, 0);

    let updated = store.update_running_count(run.id, 3).unwrap();
    assert_eq!(updated.running_count, 3);
    let version_after_change = updated.version;

    // Same count again does not append a new event or bump the version.
    let unchanged = store.update_running_count(run.id, 3).unwrap();
    assert_eq!(unchanged.version, version_after_change);
}

#[test]
fn list_runs_pages_by_ascending_id() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    for _ in 0..5 {
        store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
    }

    let (page1, cursor1) = store.list_runs(None, 2);
    assert_eq!(page1.len(), 2);
    assert_eq!(page1[0].id.value(), 1);
    assert_eq!(page1[1].id.value(), 2);
    let cursor1 = cursor1.expect("more pages remain");

    let (page2, _) = store.list_runs(Some(cursor1), 10);
    assert_eq!(page2.len(), 3);
    assert_eq!(page2[0].id.value(), 3);
}

#[test]
fn create_and_soft_delete_buffer() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());

    let buffer = store.create_buffer(Default::default(), None).unwrap();
    assert!(!buffer.is_soft_deleted());

    let deleted = store.soft_delete_buffer(buffer.id).unwrap();
    assert!(deleted.is_soft_deleted());
}

#[test]
fn reopen_replays_wal_and_preserves_state() {
    let dir = tempdir().unwrap();
    let run_id;
    {
        let mut store = open_store(dir.path());
        store.upsert_codespec(Codespec::builder().name("echo").build()).unwrap();
        let run = store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
        run_id = run.id;
        store.flush().unwrap();
    }

    let reopened = open_store(dir.path());
    assert_eq!(reopened.get_codespec("echo").unwrap().version, 1);
    assert_eq!(reopened.get_run(run_id).unwrap().id, run_id);
}

#[test]
fn maybe_snapshot_is_noop_below_threshold() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path());
    store.create_run(RunConfig::builder("echo/versions/1").build()).unwrap();
    assert!(!store.maybe_snapshot().unwrap());
}
