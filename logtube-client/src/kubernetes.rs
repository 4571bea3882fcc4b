//! `kube`-backed implementation of [`ClusterClient`]

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams, ListParams, Patch, PatchParams};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::convert::{pod_info, workload_from_deployment, workload_from_stateful_set};
use crate::error::{ClientError, Result};
use crate::{ClusterClient, ExecOutput};
use logtube_core::domain::{PodInfo, PodRef, Workload, WorkloadKind, WorkloadRef};
use logtube_core::patch::{PatchDocument, PatchFormat};

/// Items requested per list page
const PAGE_SIZE: u32 = 500;

/// Cluster client talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeClusterClient {
    client: kube::Client,
}

impl KubeClusterClient {
    /// Wraps an existing `kube` client
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Builds a client from the in-cluster service account or local kubeconfig
    pub async fn try_default() -> Result<Self> {
        let client = kube::Client::try_default().await?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = list_all(&api, ListParams::default()).await?;
        Ok(namespaces
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    async fn list_workloads(&self, namespace: &str, kind: WorkloadKind) -> Result<Vec<Workload>> {
        let workloads = match kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                list_all(&api, ListParams::default())
                    .await?
                    .into_iter()
                    .map(|d| workload_from_deployment(namespace, d))
                    .collect()
            }
            WorkloadKind::StatefulSet => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
                list_all(&api, ListParams::default())
                    .await?
                    .into_iter()
                    .map(|s| workload_from_stateful_set(namespace, s))
                    .collect()
            }
        };
        Ok(workloads)
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<PodInfo>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = list_all(&api, ListParams::default().labels(selector)).await?;
        Ok(pods.into_iter().map(|p| pod_info(namespace, p)).collect())
    }

    async fn exec(&self, pod: &PodRef, container: &str, command: &[String]) -> Result<ExecOutput> {
        debug!("Executing in {} container {}: {:?}", pod, container, command);

        let api: Api<Pod> = Api::namespaced(self.client.clone(), &pod.namespace);
        let params = AttachParams::default()
            .container(container)
            .stdin(false)
            .stdout(true)
            .stderr(true);

        let mut process = api.exec(&pod.name, command.to_vec(), &params).await?;

        let stdout = process.stdout();
        let stderr = process.stderr();
        let status = process.take_status();

        let (stdout, stderr) = tokio::try_join!(drain(stdout), drain(stderr))?;

        let status = match status {
            Some(status) => status.await,
            None => None,
        };

        process
            .join()
            .await
            .map_err(|e| ClientError::Stream(e.to_string()))?;

        let status = status
            .ok_or_else(|| ClientError::Stream("exec finished without a status".to_string()))?;

        let output = ExecOutput {
            stdout,
            stderr,
            exit_code: exit_code(&status),
        };

        debug!(
            "Exec in {} finished: exit_code={}, stdout_len={}, stderr_len={}",
            pod,
            output.exit_code,
            output.stdout.len(),
            output.stderr.len()
        );

        Ok(output)
    }

    async fn patch_workload(&self, target: &WorkloadRef, patch: &PatchDocument) -> Result<()> {
        match target.kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), &target.namespace);
                submit_patch(&api, &target.name, patch).await
            }
            WorkloadKind::StatefulSet => {
                let api: Api<StatefulSet> =
                    Api::namespaced(self.client.clone(), &target.namespace);
                submit_patch(&api, &target.name, patch).await
            }
        }
    }
}

/// Lists every object, following continue tokens page by page
async fn list_all<K>(api: &Api<K>, params: ListParams) -> Result<Vec<K>>
where
    K: Clone + DeserializeOwned + Debug,
{
    let mut params = params.limit(PAGE_SIZE);
    let mut items = Vec::new();

    loop {
        let page = api.list(&params).await?;
        items.extend(page.items);

        match page.metadata.continue_ {
            Some(token) if !token.is_empty() => params = params.continue_token(&token),
            _ => break,
        }
    }

    Ok(items)
}

async fn submit_patch<K>(api: &Api<K>, name: &str, patch: &PatchDocument) -> Result<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    let params = PatchParams::default();

    match patch.format {
        PatchFormat::StrategicMerge => {
            api.patch(name, &params, &Patch::Strategic(&patch.body))
                .await?;
        }
        PatchFormat::JsonPatch => {
            let ops: json_patch::Patch = serde_json::from_value(patch.body.clone())
                .map_err(|e| ClientError::InvalidPatch(e.to_string()))?;
            api.patch(name, &params, &Patch::<()>::Json(ops)).await?;
        }
    }

    Ok(())
}

async fn drain<R>(reader: Option<R>) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| ClientError::Stream(e.to_string()))?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Extracts the process exit code from an exec status
///
/// The API server reports success as `status: Success` and a non-zero exit
/// as a failure whose `ExitCode` cause carries the code.
fn exit_code(status: &Status) -> i32 {
    if status.status.as_deref() == Some("Success") {
        return 0;
    }

    status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
        })
        .and_then(|c| c.message.as_deref())
        .and_then(|m| m.parse().ok())
        .unwrap_or(1)
}
