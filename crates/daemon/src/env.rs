// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("could not determine a state directory: set TYGER_STATE_DIR or HOME")]
    NoStateDir,
    #[error("TYGER_WORKLOAD_BACKEND must be \"kubernetes\" or \"docker\", got {0:?}")]
    UnknownBackend(String),
    #[error("TYGER_SIGNING_KEY must be set to a non-empty secret")]
    MissingSigningKey,
}

/// Resolve state directory: `TYGER_STATE_DIR` > `XDG_STATE_HOME/tyger` >
/// `~/.local/state/tyger`.
pub fn state_dir() -> Result<PathBuf, EnvError> {
    if let Ok(dir) = std::env::var("TYGER_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("tyger"));
    }
    let home = dirs::home_dir().ok_or(EnvError::NoStateDir)?;
    Ok(home.join(".local/state/tyger"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadBackend {
    Kubernetes,
    Docker,
}

/// Which `WorkloadDriver` implementation to construct, selected by
/// `TYGER_WORKLOAD_BACKEND` (default `kubernetes`).
pub fn workload_backend() -> Result<WorkloadBackend, EnvError> {
    match std::env::var("TYGER_WORKLOAD_BACKEND").ok().as_deref() {
        None => Ok(WorkloadBackend::Kubernetes),
        Some("kubernetes") => Ok(WorkloadBackend::Kubernetes),
        Some("docker") => Ok(WorkloadBackend::Docker),
        Some(other) => Err(EnvError::UnknownBackend(other.to_string())),
    }
}

pub fn k8s_namespace() -> String {
    std::env::var("TYGER_K8S_NAMESPACE").unwrap_or_else(|_| "default".to_string())
}

pub fn internal_base_uri() -> String {
    std::env::var("TYGER_INTERNAL_BASE_URI").unwrap_or_else(|_| "http://buffer-sidecar.internal".to_string())
}

pub fn external_base_uri() -> String {
    std::env::var("TYGER_EXTERNAL_BASE_URI").unwrap_or_else(|_| "https://buffers.tyger.example".to_string())
}

/// HMAC signing secret for the Buffer Access Service's `TokenSigner`.
/// Required — there is no safe default for a credential-signing key.
pub fn signing_key_secret() -> Result<Vec<u8>, EnvError> {
    std::env::var("TYGER_SIGNING_KEY")
        .ok()
        .filter(|s| !s.is_empty())
        .map(String::into_bytes)
        .ok_or(EnvError::MissingSigningKey)
}

fn duration_ms(var: &str, default_ms: u64) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(default_ms))
}

pub fn sweep_interval() -> Duration {
    duration_ms("TYGER_SWEEP_INTERVAL_MS", 30_000)
}

pub fn provisioning_timeout_ms() -> u64 {
    duration_ms("TYGER_PROVISIONING_TIMEOUT_MS", 10 * 60 * 1000).as_millis() as u64
}

pub fn cancel_hard_deadline_ms() -> u64 {
    duration_ms("TYGER_CANCEL_HARD_DEADLINE_MS", 5 * 60 * 1000).as_millis() as u64
}

pub fn log_retention_grace_ms() -> u64 {
    duration_ms("TYGER_LOG_RETENTION_GRACE_MS", 30_000).as_millis() as u64
}

pub fn credential_refresh_window_ms() -> u64 {
    duration_ms("TYGER_CREDENTIAL_REFRESH_WINDOW_MS", 10 * 60 * 1000).as_millis() as u64
}

pub fn archive_backoff_cap() -> Duration {
    duration_ms("TYGER_ARCHIVE_BACKOFF_CAP_MS", 3600 * 1000)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
