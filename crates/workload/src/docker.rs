// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker-backed [`WorkloadDriver`] — a single-host backend that runs each
//! job/worker replica as a plain container, for development and small
//! deployments that don't have a Kubernetes cluster available.
//!
//! Grounded on `oj_daemon::adapters::agent::docker::DockerAdapter`: the
//! same "shell out to the `docker` CLI via `tokio::process::Command`,
//! wrapped in a `run_docker(args) -> Result<String, String>` helper"
//! pattern, extended from a single named container per agent to a
//! `tyger-run`/`tyger-job`/`tyger-worker`-labeled container set so
//! `list_by_label` can recover runs without an external ledger.

use crate::driver::{CreatedObjects, LabelPage, LaunchRequest, LogOptions, WorkloadDriver, WorkloadObservation};
use crate::error::{WorkloadError, WorkloadResult};
use crate::labels::{FINALIZER, LABEL_JOB, LABEL_RUN, LABEL_WORKER};
use async_trait::async_trait;
use tyger_core::RunId;

/// Docker has no native per-run secret object, so credentials are passed
/// as env vars directly rather than mounted from a file (unlike
/// [`crate::kubernetes::KubernetesDriver`], which mounts a `Secret`).
pub struct DockerDriver;

impl Default for DockerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerDriver {
    pub fn new() -> Self {
        Self
    }

    async fn run_one(&self, request: &LaunchRequest, container_name: &str, role_label: (&str, &str)) -> WorkloadResult<()> {
        let image = request.codespec.image.clone();
        let mut args: Vec<String> = vec!["run".into(), "-d".into(), "--name".into(), container_name.into()];

        args.push("--label".into());
        args.push(format!("{LABEL_RUN}={}", request.run_id));
        args.push("--label".into());
        args.push(format!("{}={}", role_label.0, role_label.1));
        args.push("--label".into());
        args.push(format!("tyger-finalizer={FINALIZER}"));

        for (k, v) in &request.env {
            args.push("-e".into());
            args.push(format!("{k}={v}"));
        }
        for (k, v) in &request.secret_map {
            args.push("-e".into());
            args.push(format!("{}_BUFFER_URI={v}", k.to_uppercase()));
        }
        if let Some(dir) = &request.codespec.working_dir {
            args.push("-w".into());
            args.push(dir.clone());
        }

        args.push(image);
        args.extend(request.codespec.command.iter().cloned());
        args.extend(request.codespec.args.iter().cloned());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        tracing::info!(run_id = %request.run_id, %container_name, "spawning docker container");
        run_docker(&arg_refs)
            .await
            .map(|_| ())
            .map_err(|e| WorkloadError::Internal(format!("docker run failed: {e}")))
    }

    async fn containers_for_run(&self, run_id: RunId) -> WorkloadResult<Vec<String>> {
        let filter = format!("label={LABEL_RUN}={run_id}");
        let output = run_docker(&["ps", "-a", "--filter", &filter, "--format", "{{.Names}}"])
            .await
            .map_err(|e| WorkloadError::Internal(format!("docker ps failed: {e}")))?;
        Ok(parse_names(&output))
    }
}

fn parse_names(output: &str) -> Vec<String> {
    output.lines().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn parse_run_ids(output: &str) -> Vec<RunId> {
    let mut run_ids: Vec<RunId> = output
        .lines()
        .filter_map(|line| line.trim().parse::<u64>().ok())
        .map(RunId::new)
        .collect();
    run_ids.sort_unstable();
    run_ids.dedup();
    run_ids
}

#[async_trait]
impl WorkloadDriver for DockerDriver {
    async fn launch_job(&self, request: LaunchRequest) -> WorkloadResult<CreatedObjects> {
        let name = crate::labels::job_name(request.run_id);
        if !self.containers_for_run(request.run_id).await?.is_empty() {
            return Err(WorkloadError::ConflictExists);
        }
        self.run_one(&request, &name, (LABEL_JOB, &name)).await?;
        Ok(CreatedObjects { ids: vec![name] })
    }

    async fn launch_worker(&self, request: LaunchRequest, replicas: u32) -> WorkloadResult<CreatedObjects> {
        let base = crate::labels::worker_name(request.run_id);
        let mut ids = Vec::new();
        for i in 0..replicas {
            let name = format!("{base}-{i}");
            self.run_one(&request, &name, (LABEL_WORKER, &base)).await?;
            ids.push(name);
        }
        Ok(CreatedObjects { ids })
    }

    async fn observe(&self, run_id: RunId) -> WorkloadResult<WorkloadObservation> {
        let names = self.containers_for_run(run_id).await?;
        if names.is_empty() {
            return Err(WorkloadError::NotFound(format!("no containers for run {run_id}")));
        }

        let mut obs = WorkloadObservation::default();
        for name in &names {
            let status = run_docker(&["inspect", "-f", "{{.State.Status}}", name])
                .await
                .unwrap_or_else(|_| "missing".to_string());
            match status.as_str() {
                "running" => obs.running_pods += 1,
                "created" | "restarting" => obs.pending_pods += 1,
                "exited" => {
                    let exit_code = run_docker(&["inspect", "-f", "{{.State.ExitCode}}", name])
                        .await
                        .ok()
                        .and_then(|s| s.parse::<i32>().ok())
                        .unwrap_or(-1);
                    if exit_code == 0 {
                        obs.job_succeeded = true;
                    } else {
                        obs.job_failed = true;
                        obs.failure_reason = Some(format!("container {name} exited with code {exit_code}"));
                    }
                }
                _ => {}
            }
        }
        obs.all_pods_deleted = false;
        Ok(obs)
    }

    async fn list_logs(&self, run_id: RunId, opts: LogOptions) -> WorkloadResult<Vec<u8>> {
        let names = self.containers_for_run(run_id).await?;
        let name = names.first().ok_or_else(|| WorkloadError::NotFound(format!("no containers for run {run_id}")))?;

        let mut args: Vec<String> = vec!["logs".into()];
        if opts.include_timestamps {
            args.push("--timestamps".into());
        }
        if let Some(n) = opts.tail_lines {
            args.push("--tail".into());
            args.push(n.to_string());
        }
        args.push(name.clone());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = run_docker(&arg_refs)
            .await
            .map_err(|e| WorkloadError::Internal(format!("docker logs failed: {e}")))?;
        Ok(output.into_bytes())
    }

    async fn cancel(&self, run_id: RunId) -> WorkloadResult<()> {
        let job_name = crate::labels::job_name(run_id);
        match run_docker(&["stop", &job_name]).await {
            Ok(_) => Ok(()),
            Err(e) if e.contains("No such container") => Ok(()),
            Err(e) => Err(WorkloadError::Internal(format!("docker stop failed: {e}"))),
        }
    }

    async fn delete_all(&self, run_id: RunId) -> WorkloadResult<()> {
        for name in self.containers_for_run(run_id).await? {
            let _ = run_docker(&["rm", "-f", &name]).await;
        }
        Ok(())
    }

    /// Docker has no secret object to patch and `docker run` env vars are
    /// fixed at container creation, so a live credential swap would need
    /// to recreate the container mid-run. Rather than disrupt a running
    /// job, this backend logs and no-ops; a run started with a long TTL
    /// relative to its expected duration avoids ever hitting this path.
    async fn refresh_secret(&self, run_id: RunId, _secret_map: indexmap::IndexMap<String, String>) -> WorkloadResult<()> {
        tracing::warn!(%run_id, "docker backend cannot refresh credentials on a running container");
        Ok(())
    }

    async fn list_by_label(&self, label: &str, _continuation: Option<String>) -> WorkloadResult<LabelPage> {
        let filter = format!("label={label}");
        let output = run_docker(&["ps", "-a", "--filter", &filter, "--format", "{{.Label \"tyger-run\"}}"])
            .await
            .map_err(|e| WorkloadError::Internal(format!("docker ps failed: {e}")))?;

        let run_ids = parse_run_ids(&output);

        // Docker has no server-side pagination for `ps`, so every call
        // returns the full result set in one page.
        Ok(LabelPage { run_ids, continuation: None })
    }
}

/// Run a docker CLI command and return stdout on success.
async fn run_docker(args: &[&str]) -> Result<String, String> {
    let output = tokio::process::Command::new("docker")
        .args(args)
        .output()
        .await
        .map_err(|e| format!("failed to exec docker: {e}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("docker {} failed: {}", args.first().unwrap_or(&""), stderr.trim()))
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
