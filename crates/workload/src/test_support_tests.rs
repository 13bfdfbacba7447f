use super::*;
use tyger_core::CodespecBuilder;

fn request(run_id: u64) -> LaunchRequest {
    LaunchRequest {
        run_id: RunId::new(run_id),
        codespec: CodespecBuilder::default().build(),
        env: indexmap::IndexMap::new(),
        secret_map: indexmap::IndexMap::new(),
        target: "job".to_string(),
    }
}

#[tokio::test]
async fn launch_job_rejects_a_second_launch_for_the_same_run() {
    let driver = FakeDriver::new();
    driver.launch_job(request(1)).await.unwrap();
    let err = driver.launch_job(request(1)).await.unwrap_err();
    assert!(matches!(err, WorkloadError::ConflictExists));
}

#[tokio::test]
async fn observe_fails_for_an_unknown_run() {
    let driver = FakeDriver::new();
    let err = driver.observe(RunId::new(99)).await.unwrap_err();
    assert!(matches!(err, WorkloadError::NotFound(_)));
}

#[tokio::test]
async fn cancel_marks_the_run_as_canceling() {
    let driver = FakeDriver::new();
    driver.launch_job(request(2)).await.unwrap();
    driver.cancel(RunId::new(2)).await.unwrap();
    assert!(driver.is_canceling(RunId::new(2)));
}

#[tokio::test]
async fn delete_all_marks_the_run_as_deleted() {
    let driver = FakeDriver::new();
    driver.launch_job(request(3)).await.unwrap();
    assert!(!driver.is_deleted(RunId::new(3)));
    driver.delete_all(RunId::new(3)).await.unwrap();
    assert!(driver.is_deleted(RunId::new(3)));
}

#[tokio::test]
async fn refresh_secret_updates_the_stored_map_for_a_known_run() {
    let driver = FakeDriver::new();
    driver.launch_job(request(5)).await.unwrap();

    let mut map = indexmap::IndexMap::new();
    map.insert("input".to_string(), "buf://rotated".to_string());
    driver.refresh_secret(RunId::new(5), map.clone()).await.unwrap();

    assert_eq!(driver.secret_map(RunId::new(5)), map);
}

#[tokio::test]
async fn refresh_secret_fails_for_an_unknown_run() {
    let driver = FakeDriver::new();
    let err = driver.refresh_secret(RunId::new(98), indexmap::IndexMap::new()).await.unwrap_err();
    assert!(matches!(err, WorkloadError::NotFound(_)));
}

#[tokio::test]
async fn calls_are_recorded_in_order() {
    let driver = FakeDriver::new();
    driver.launch_job(request(4)).await.unwrap();
    driver.observe(RunId::new(4)).await.unwrap();
    let calls = driver.calls();
    assert!(matches!(calls[0], DriverCall::LaunchJob(id) if id == RunId::new(4)));
    assert!(matches!(calls[1], DriverCall::Observe(id) if id == RunId::new(4)));
}
