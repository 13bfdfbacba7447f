// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes-backed [`WorkloadDriver`] — runs each job as a `Job` object
//! (plus an optional worker `StatefulSet`/`Service`) with credentials
//! mounted from a per-run `Secret`.
//!
//! Grounded closely on
//! `oj_daemon::adapters::agent::k8s::adapter::KubernetesAdapter` and
//! `k8s::pod::build_pod`: same `kube::Client` + `Api<T>` + label-selector
//! lookup pattern, same `tracing::info!`-on-create-`tracing::warn!`-on-
//! cleanup-failure shape. Extended from the teacher's bare `Pod` creation
//! to the `Job`+`StatefulSet`+`Service`+`Secret` object set spec.md §4.3
//! requires, and from a single `app=oj-agent` label to the `tyger-run`/
//! `tyger-job`/`tyger-worker` label set plus the `tyger-finalizer`.

use crate::driver::{CreatedObjects, LabelPage, LaunchRequest, LogOptions, WorkloadDriver, WorkloadObservation};
use crate::error::{WorkloadError, WorkloadResult};
use crate::labels::{self, FINALIZER, LABEL_JOB, LABEL_RUN, LABEL_WORKER};
use async_trait::async_trait;
use indexmap::IndexMap;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, PodSpec, PodTemplateSpec, Secret, SecretVolumeSource, Service, ServiceSpec,
    Volume, VolumeMount,
};
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use tyger_core::RunId;

const SECRET_MOUNT_PATH: &str = "/var/run/tyger/secrets";

pub struct KubernetesDriver {
    client: Client,
    namespace: String,
}

impl KubernetesDriver {
    pub async fn new(namespace: impl Into<String>) -> WorkloadResult<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| WorkloadError::ClusterUnavailable(e.to_string()))?;
        Ok(Self { client, namespace: namespace.into() })
    }

    fn jobs(&self) -> Api<Job> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn stateful_sets(&self) -> Api<StatefulSet> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn services(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn ensure_secret(&self, request: &LaunchRequest) -> WorkloadResult<()> {
        if request.secret_map.is_empty() {
            return Ok(());
        }
        let mut string_data = BTreeMap::new();
        for (k, v) in &request.secret_map {
            string_data.insert(k.clone(), v.clone());
        }
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(labels::secret_name(request.run_id)),
                namespace: Some(self.namespace.clone()),
                labels: Some(run_labels(request.run_id, None)),
                ..Default::default()
            },
            string_data: Some(string_data),
            ..Default::default()
        };
        self.secrets()
            .create(&PostParams::default(), &secret)
            .await
            .map_err(|e| WorkloadError::Internal(format!("secret create failed: {e}")))?;
        Ok(())
    }

    fn build_container(&self, request: &LaunchRequest, has_secret: bool) -> Container {
        let mut env: Vec<EnvVar> = request
            .env
            .iter()
            .map(|(k, v)| EnvVar { name: k.clone(), value: Some(v.clone()), ..Default::default() })
            .collect();
        for name in request.secret_map.keys() {
            env.push(EnvVar {
                name: format!("{}_BUFFER_URI_FILE", name.to_uppercase()),
                value: Some(format!("{SECRET_MOUNT_PATH}/{name}")),
                ..Default::default()
            });
        }

        Container {
            name: "main".to_string(),
            image: Some(request.codespec.image.clone()),
            command: if request.codespec.command.is_empty() { None } else { Some(request.codespec.command.clone()) },
            args: if request.codespec.args.is_empty() { None } else { Some(request.codespec.args.clone()) },
            working_dir: request.codespec.working_dir.clone(),
            env: Some(env),
            volume_mounts: if has_secret {
                Some(vec![VolumeMount {
                    name: "secrets".to_string(),
                    mount_path: SECRET_MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                }])
            } else {
                None
            },
            ..Default::default()
        }
    }

    fn secret_volume(&self, run_id: RunId) -> Volume {
        Volume {
            name: "secrets".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(labels::secret_name(run_id)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

fn run_labels(run_id: RunId, role: Option<(&str, String)>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert(LABEL_RUN.to_string(), run_id.to_string());
    if let Some((key, value)) = role {
        map.insert(key.to_string(), value);
    }
    map
}

/// Metadata for a Job's/StatefulSet's `PodTemplateSpec`. The finalizer
/// belongs here, not on the Job/StatefulSet's own `ObjectMeta` — Kubernetes
/// only propagates it to the pods it creates from this template, and
/// those pods are what `delete_all` actually needs to hold open until
/// their logs are read.
fn pod_template_metadata(labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta { labels: Some(labels), finalizers: Some(vec![FINALIZER.to_string()]), ..Default::default() }
}

#[async_trait]
impl WorkloadDriver for KubernetesDriver {
    async fn launch_job(&self, request: LaunchRequest) -> WorkloadResult<CreatedObjects> {
        self.ensure_secret(&request).await?;
        let has_secret = !request.secret_map.is_empty();
        let name = labels::job_name(request.run_id);
        let job_labels = run_labels(request.run_id, Some((LABEL_JOB, name.clone())));

        let container = self.build_container(&request, has_secret);
        let volumes = has_secret.then(|| vec![self.secret_volume(request.run_id)]);

        let job = Job {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(job_labels.clone()),
                ..Default::default()
            },
            spec: Some(JobSpec {
                backoff_limit: Some(2),
                template: PodTemplateSpec {
                    metadata: Some(pod_template_metadata(job_labels)),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        volumes,
                        restart_policy: Some("Never".to_string()),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        };

        tracing::info!(run_id = %request.run_id, %name, namespace = %self.namespace, "creating job");
        match self.jobs().create(&PostParams::default(), &job).await {
            Ok(_) => Ok(CreatedObjects { ids: vec![name] }),
            Err(kube::Error::Api(e)) if e.code == 409 => Err(WorkloadError::ConflictExists),
            Err(e) => Err(WorkloadError::ClusterUnavailable(e.to_string())),
        }
    }

    async fn launch_worker(&self, request: LaunchRequest, replicas: u32) -> WorkloadResult<CreatedObjects> {
        let name = labels::worker_name(request.run_id);
        let worker_labels = run_labels(request.run_id, Some((LABEL_WORKER, name.clone())));
        let container = self.build_container(&request, !request.secret_map.is_empty());
        let volumes = (!request.secret_map.is_empty()).then(|| vec![self.secret_volume(request.run_id)]);

        let service = Service {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(worker_labels.clone()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: Some("None".to_string()),
                selector: Some(worker_labels.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.services()
            .create(&PostParams::default(), &service)
            .await
            .map_err(|e| WorkloadError::Internal(format!("worker service create failed: {e}")))?;

        let stateful_set = StatefulSet {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(worker_labels.clone()),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                replicas: Some(replicas as i32),
                service_name: name.clone(),
                selector: LabelSelector { match_labels: Some(worker_labels.clone()), ..Default::default() },
                template: PodTemplateSpec {
                    metadata: Some(pod_template_metadata(worker_labels)),
                    spec: Some(PodSpec { containers: vec![container], volumes, ..Default::default() }),
                },
                ..Default::default()
            }),
            status: None,
        };

        tracing::info!(run_id = %request.run_id, %name, replicas, "creating worker statefulset");
        self.stateful_sets()
            .create(&PostParams::default(), &stateful_set)
            .await
            .map_err(|e| WorkloadError::ClusterUnavailable(e.to_string()))?;

        Ok(CreatedObjects { ids: vec![name] })
    }

    async fn observe(&self, run_id: RunId) -> WorkloadResult<WorkloadObservation> {
        let name = labels::job_name(run_id);
        let job = self
            .jobs()
            .get(&name)
            .await
            .map_err(|_| WorkloadError::NotFound(format!("job {name}")))?;

        let status = job.status.unwrap_or_default();
        let conditions = status.conditions.unwrap_or_default();
        let job_succeeded = conditions.iter().any(|c| c.type_ == "Complete" && c.status == "True");
        let job_failed = conditions.iter().any(|c| c.type_ == "Failed" && c.status == "True");
        let failure_reason = conditions
            .iter()
            .find(|c| c.type_ == "Failed" && c.status == "True")
            .and_then(|c| c.reason.clone());

        let pods = Api::<k8s_openapi::api::core::v1::Pod>::namespaced(self.client.clone(), &self.namespace)
            .list(&ListParams::default().labels(&format!("{LABEL_RUN}={run_id}")))
            .await
            .map_err(|e| WorkloadError::ClusterUnavailable(e.to_string()))?;

        let running_pods = pods.items.iter().filter(|p| pod_phase(p) == "Running").count() as u32;
        let pending_pods = pods.items.iter().filter(|p| pod_phase(p) == "Pending").count() as u32;
        let pods_have_deletion_timestamp = pods.items.iter().any(|p| p.metadata.deletion_timestamp.is_some());
        let all_pods_deleted = pods.items.is_empty();

        Ok(WorkloadObservation {
            job_succeeded,
            job_failed,
            failure_reason,
            backoff_limit_exceeded: status.failed.unwrap_or(0) > 0 && job_failed,
            running_pods,
            pending_pods,
            pods_have_deletion_timestamp,
            all_pods_deleted,
        })
    }

    async fn list_logs(&self, run_id: RunId, opts: LogOptions) -> WorkloadResult<Vec<u8>> {
        let pods = Api::<k8s_openapi::api::core::v1::Pod>::namespaced(self.client.clone(), &self.namespace)
            .list(&ListParams::default().labels(&format!("{LABEL_RUN}={run_id}")))
            .await
            .map_err(|e| WorkloadError::ClusterUnavailable(e.to_string()))?;
        let pod = pods.items.first().ok_or_else(|| WorkloadError::NotFound(format!("no pods for run {run_id}")))?;
        let pod_name = pod.metadata.name.clone().ok_or_else(|| WorkloadError::Internal("pod has no name".into()))?;

        // `since_time_ms` is intentionally not translated into
        // `LogParams::since_time` (which wants a `chrono` timestamp this
        // crate has no dependency on) — the `since` bound is instead
        // enforced by the Log Archiver's own filter pipeline (spec.md
        // §4.7), which every caller of `list_logs` runs output through.
        let log_params = kube::api::LogParams {
            timestamps: opts.include_timestamps,
            tail_lines: opts.tail_lines.map(|n| n as i64),
            follow: opts.follow,
            ..Default::default()
        };
        let pods_api = Api::<k8s_openapi::api::core::v1::Pod>::namespaced(self.client.clone(), &self.namespace);
        let logs = pods_api
            .logs(&pod_name, &log_params)
            .await
            .map_err(|e| WorkloadError::ClusterUnavailable(e.to_string()))?;
        Ok(logs.into_bytes())
    }

    async fn cancel(&self, run_id: RunId) -> WorkloadResult<()> {
        let name = labels::job_name(run_id);
        let dp = DeleteParams { propagation_policy: Some(kube::api::PropagationPolicy::Orphan), ..Default::default() };
        match self.jobs().delete(&name, &dp).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(WorkloadError::ClusterUnavailable(e.to_string())),
        }
    }

    async fn delete_all(&self, run_id: RunId) -> WorkloadResult<()> {
        let dp = DeleteParams::default();
        let job_name = labels::job_name(run_id);
        let worker_name = labels::worker_name(run_id);
        let secret_name = labels::secret_name(run_id);

        delete_ignoring_not_found(self.jobs().delete(&job_name, &dp)).await?;
        delete_ignoring_not_found(self.stateful_sets().delete(&worker_name, &dp)).await?;
        delete_ignoring_not_found(self.services().delete(&worker_name, &dp)).await?;
        delete_ignoring_not_found(self.secrets().delete(&secret_name, &dp)).await?;

        let pods_api = Api::<k8s_openapi::api::core::v1::Pod>::namespaced(self.client.clone(), &self.namespace);
        let pods = pods_api
            .list(&ListParams::default().labels(&format!("{LABEL_RUN}={run_id}")))
            .await
            .map_err(|e| WorkloadError::ClusterUnavailable(e.to_string()))?;
        for pod in pods.items {
            if let Some(pod_name) = pod.metadata.name {
                remove_finalizer(&pods_api, &pod_name).await;
                delete_ignoring_not_found(pods_api.delete(&pod_name, &dp)).await?;
            }
        }
        Ok(())
    }

    async fn refresh_secret(&self, run_id: RunId, secret_map: IndexMap<String, String>) -> WorkloadResult<()> {
        let mut string_data = BTreeMap::new();
        for (k, v) in secret_map {
            string_data.insert(k, v);
        }
        let patch = Secret { string_data: Some(string_data), ..Default::default() };
        let pp = kube::api::PatchParams::apply("tyger-credential-refresher");
        self.secrets()
            .patch(&labels::secret_name(run_id), &pp, &kube::api::Patch::Merge(&patch))
            .await
            .map_err(|e| match e {
                kube::Error::Api(api_err) if api_err.code == 404 => {
                    WorkloadError::NotFound(format!("secret for run {run_id}"))
                }
                other => WorkloadError::Internal(format!("secret patch failed: {other}")),
            })?;
        Ok(())
    }

    async fn list_by_label(&self, label: &str, continuation: Option<String>) -> WorkloadResult<LabelPage> {
        let mut lp = ListParams::default().labels(label);
        if let Some(token) = continuation {
            lp = lp.continue_token(&token);
        }
        let list = self.jobs().list(&lp).await.map_err(|e| WorkloadError::ClusterUnavailable(e.to_string()))?;

        let run_ids = list
            .items
            .iter()
            .filter_map(|job| job.metadata.labels.as_ref()?.get(LABEL_RUN))
            .filter_map(|v| v.parse::<u64>().ok())
            .map(RunId::new)
            .collect();

        Ok(LabelPage { run_ids, continuation: list.metadata.continue_ })
    }
}

fn pod_phase(pod: &k8s_openapi::api::core::v1::Pod) -> &str {
    pod.status.as_ref().and_then(|s| s.phase.as_deref()).unwrap_or("Unknown")
}

async fn remove_finalizer(pods: &Api<k8s_openapi::api::core::v1::Pod>, pod_name: &str) {
    let patch = serde_json::json!({ "metadata": { "finalizers": [] } });
    let params = kube::api::PatchParams::default();
    if let Err(e) = pods.patch(pod_name, &params, &kube::api::Patch::Merge(&patch)).await {
        tracing::warn!(%pod_name, error = %e, "failed to remove finalizer before delete");
    }
}

/// Await a `kube` delete future, treating "already gone" as success —
/// every `WorkloadDriver::delete_all` call must be idempotent (spec.md
/// §4.3).
async fn delete_ignoring_not_found<K, Fut>(fut: Fut) -> WorkloadResult<()>
where
    Fut: std::future::Future<Output = kube::Result<either::Either<K, kube::core::Status>>>,
{
    match fut.await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(WorkloadError::Internal(e.to_string())),
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod tests;
