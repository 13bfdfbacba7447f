// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition root: wires the persistent store, the buffer access
//! service, a workload driver, and the Run Lifecycle Engine into one
//! process, then runs until asked to stop.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use std::sync::Arc;

use parking_lot::Mutex;
use tyger_access::{BufferAccessService, SigningKey, TokenSigner};
use tyger_core::SystemClock;
use tyger_lifecycle::sweeper::SweeperConfig;
use tyger_lifecycle::{Engine, EngineConfig, LogArchiver};
use tyger_store::PersistentStore;
use tyger_workload::{DockerDriver, KubernetesDriver};

mod env;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "daemon exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let state_dir = env::state_dir()?;
    std::fs::create_dir_all(&state_dir)?;

    let clock = SystemClock;
    let store = Arc::new(Mutex::new(PersistentStore::open(
        state_dir.join("wal"),
        state_dir.join("snap"),
        clock.clone(),
    )?));

    let signer = TokenSigner::single(SigningKey::new("primary", env::signing_key_secret()?));
    let access = Arc::new(BufferAccessService::new(signer, env::internal_base_uri(), env::external_base_uri()));

    let archiver = Arc::new(LogArchiver::new(state_dir.join("logs")));

    let config = EngineConfig {
        credential_refresh_window_ms: env::credential_refresh_window_ms(),
        archive_backoff_cap: env::archive_backoff_cap(),
        sweeper: SweeperConfig {
            interval: env::sweep_interval(),
            provisioning_timeout_ms: env::provisioning_timeout_ms(),
            log_retention_grace_ms: env::log_retention_grace_ms(),
            cancel_hard_deadline_ms: env::cancel_hard_deadline_ms(),
        },
    };

    match env::workload_backend()? {
        env::WorkloadBackend::Kubernetes => {
            let driver = Arc::new(KubernetesDriver::new(env::k8s_namespace()).await?);
            run_with_driver(store, clock, driver, access, archiver, config).await?;
        }
        env::WorkloadBackend::Docker => {
            let driver = Arc::new(DockerDriver::new());
            run_with_driver(store, clock, driver, access, archiver, config).await?;
        }
    }

    Ok(())
}

async fn run_with_driver<D: tyger_workload::WorkloadDriver>(
    store: Arc<Mutex<PersistentStore<SystemClock>>>,
    clock: SystemClock,
    driver: Arc<D>,
    access: Arc<BufferAccessService>,
    archiver: Arc<LogArchiver>,
    config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    // Held for the process lifetime: its background sweeper/refresher tasks
    // run detached, but dropping the engine early would be a surprise to a
    // future reader reaching for it via a not-yet-built API surface.
    let _engine = Engine::new(store, clock, driver, access, archiver, config);
    tracing::info!("tyger daemon ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, exiting");
    Ok(())
}
