// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use tempfile::tempdir;
use tyger_core::test_support::job_codespec;
use tyger_core::FakeClock;
use tyger_store::PersistentStore;
use tyger_workload::test_support::FakeDriver;

fn store(dir: &std::path::Path, clock: FakeClock) -> Arc<Mutex<PersistentStore<FakeClock>>> {
    Arc::new(Mutex::new(PersistentStore::open(dir.join("wal"), dir.join("snap"), clock).unwrap()))
}

#[tokio::test]
async fn orphan_sweep_fails_a_pending_run_with_no_workload_objects() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    clock.set_epoch_ms(20 * 60 * 1000);
    let store = store(dir.path(), clock.clone());
    let driver = Arc::new(FakeDriver::new());

    {
        let mut s = store.lock();
        s.upsert_codespec(job_codespec("echo", "busybox")).unwrap();
    }
    let run = { store.lock().create_run(tyger_core::RunConfig::builder("echo/versions/1").build()).unwrap() };

    let config = SweeperConfig { provisioning_timeout_ms: 0, ..SweeperConfig::default() };
    orphan_sweep(&store, &driver, &clock, &config).await;

    let updated = store.lock().get_run(run.id).unwrap();
    assert_eq!(updated.status, RunStatus::Failed);
}

#[tokio::test]
async fn orphan_sweep_leaves_a_freshly_created_run_alone() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let store = store(dir.path(), clock.clone());
    let driver = Arc::new(FakeDriver::new());

    {
        let mut s = store.lock();
        s.upsert_codespec(job_codespec("echo", "busybox")).unwrap();
    }
    let run = { store.lock().create_run(tyger_core::RunConfig::builder("echo/versions/1").build()).unwrap() };

    let config = SweeperConfig::default();
    orphan_sweep(&store, &driver, &clock, &config).await;

    let updated = store.lock().get_run(run.id).unwrap();
    assert_eq!(updated.status, RunStatus::Pending);
}

#[tokio::test]
async fn terminal_sweep_archives_then_finalizes_a_succeeded_run() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let store = store(dir.path(), clock.clone());
    let driver = Arc::new(FakeDriver::new());
    let archiver = Arc::new(LogArchiver::new(dir.path().join("logs")));
    let subscribers = SubscriberRegistry::new();

    {
        let mut s = store.lock();
        s.upsert_codespec(job_codespec("echo", "busybox")).unwrap();
    }
    let run = { store.lock().create_run(tyger_core::RunConfig::builder("echo/versions/1").build()).unwrap() };
    driver.launch_job(tyger_workload::LaunchRequest {
        run_id: run.id,
        codespec: job_codespec("echo", "busybox"),
        env: Default::default(),
        secret_map: Default::default(),
        target: "job".to_string(),
    }).await.unwrap();
    driver.set_observation(
        run.id,
        tyger_workload::WorkloadObservation { job_succeeded: true, ..Default::default() },
    );
    {
        let mut s = store.lock();
        s.update_run_status(run.id, run.version, RunStatus::Succeeded, None).unwrap();
    }

    let config = SweeperConfig::default();
    terminal_sweep(&store, &driver, &archiver, &subscribers, &clock, &config).await;

    let updated = store.lock().get_run(run.id).unwrap();
    assert!(updated.is_final);
    assert!(updated.logs_archived_at_ms.is_some());
    assert!(archiver.is_archived(run.id));
}

#[tokio::test]
async fn terminal_sweep_archives_before_deleting_on_the_cancel_hard_deadline() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let store = store(dir.path(), clock.clone());
    let driver = Arc::new(FakeDriver::new());
    let archiver = Arc::new(LogArchiver::new(dir.path().join("logs")));
    let subscribers = SubscriberRegistry::new();

    {
        let mut s = store.lock();
        s.upsert_codespec(job_codespec("echo", "busybox")).unwrap();
    }
    let run = { store.lock().create_run(tyger_core::RunConfig::builder("echo/versions/1").build()).unwrap() };
    driver.launch_job(tyger_workload::LaunchRequest {
        run_id: run.id,
        codespec: job_codespec("echo", "busybox"),
        env: Default::default(),
        secret_map: Default::default(),
        target: "job".to_string(),
    }).await.unwrap();
    {
        let mut s = store.lock();
        s.update_run_status(run.id, run.version, RunStatus::Canceling, None).unwrap();
    }
    clock.set_epoch_ms(SweeperConfig::default().cancel_hard_deadline_ms + 1);

    let config = SweeperConfig::default();
    handle_terminal_candidate(run.id, &store, &driver, &archiver, &subscribers, clock.epoch_ms(), &config).await;

    assert!(archiver.is_archived(run.id));
    assert!(driver.is_deleted(run.id));
    let updated = store.lock().get_run(run.id).unwrap();
    assert_eq!(updated.status, RunStatus::Canceled);
    assert!(updated.is_final);
    assert!(updated.logs_archived_at_ms.is_some());
}
