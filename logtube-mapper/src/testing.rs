//! In-memory cluster used by tests

use async_trait::async_trait;
use logtube_client::{ClientError, ClusterClient, ExecOutput, Result};
use logtube_core::ANNOTATION_AUTO_MAPPING_ENABLED;
use logtube_core::domain::{
    ContainerSpec, PodInfo, PodRef, PodTemplate, Workload, WorkloadKind, WorkloadRef,
};
use logtube_core::patch::PatchDocument;
use logtube_core::selector::parse_selector;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

enum ExecBehavior {
    Output(ExecOutput),
    Fail,
    Hang,
}

struct FakePod {
    labels: BTreeMap<String, String>,
    info: PodInfo,
}

/// Cluster state plus a record of every call that reached it
#[derive(Default)]
pub struct FakeCluster {
    namespaces: Vec<String>,
    workloads: Vec<Workload>,
    pods: Vec<FakePod>,
    exec: HashMap<(String, String), ExecBehavior>,
    fail_namespaces: bool,
    fail_pod_lists: bool,
    reject_patches_for: Vec<String>,
    exec_calls: Mutex<Vec<(PodRef, String, Vec<String>)>>,
    patches: Mutex<Vec<(WorkloadRef, PatchDocument)>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespaces.push(namespace.to_string());
        self
    }

    pub fn with_workload(mut self, workload: Workload) -> Self {
        if !self.namespaces.contains(&workload.id.namespace) {
            self.namespaces.push(workload.id.namespace.clone());
        }
        self.workloads.push(workload);
        self
    }

    pub fn with_pod(mut self, labels: &[(&str, &str)], info: PodInfo) -> Self {
        self.pods.push(FakePod {
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            info,
        });
        self
    }

    pub fn with_exec(self, pod: &str, container: &str, stdout: &str) -> Self {
        self.with_exec_output(
            pod,
            container,
            ExecOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
            },
        )
    }

    pub fn with_exec_output(mut self, pod: &str, container: &str, output: ExecOutput) -> Self {
        self.exec.insert(
            (pod.to_string(), container.to_string()),
            ExecBehavior::Output(output),
        );
        self
    }

    pub fn with_exec_failure(mut self, pod: &str, container: &str) -> Self {
        self.exec
            .insert((pod.to_string(), container.to_string()), ExecBehavior::Fail);
        self
    }

    pub fn with_exec_hang(mut self, pod: &str, container: &str) -> Self {
        self.exec
            .insert((pod.to_string(), container.to_string()), ExecBehavior::Hang);
        self
    }

    pub fn failing_namespace_list(mut self) -> Self {
        self.fail_namespaces = true;
        self
    }

    pub fn failing_pod_list(mut self) -> Self {
        self.fail_pod_lists = true;
        self
    }

    pub fn rejecting_patch_for(mut self, name: &str) -> Self {
        self.reject_patches_for.push(name.to_string());
        self
    }

    pub fn exec_calls(&self) -> Vec<(PodRef, String, Vec<String>)> {
        self.exec_calls.lock().unwrap().clone()
    }

    pub fn patches(&self) -> Vec<(WorkloadRef, PatchDocument)> {
        self.patches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        if self.fail_namespaces {
            return Err(ClientError::Status {
                status: 403,
                message: "namespaces is forbidden".to_string(),
            });
        }
        Ok(self.namespaces.clone())
    }

    async fn list_workloads(&self, namespace: &str, kind: WorkloadKind) -> Result<Vec<Workload>> {
        Ok(self
            .workloads
            .iter()
            .filter(|w| w.id.namespace == namespace && w.id.kind == kind)
            .cloned()
            .collect())
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<PodInfo>> {
        if self.fail_pod_lists {
            return Err(ClientError::Stream("connection refused".to_string()));
        }
        let wanted = parse_selector(selector).ok_or_else(|| ClientError::Status {
            status: 400,
            message: format!("invalid selector: {}", selector),
        })?;

        Ok(self
            .pods
            .iter()
            .filter(|p| p.info.pod.namespace == namespace)
            .filter(|p| wanted.iter().all(|(k, v)| p.labels.get(k) == Some(v)))
            .map(|p| p.info.clone())
            .collect())
    }

    async fn exec(&self, pod: &PodRef, container: &str, command: &[String]) -> Result<ExecOutput> {
        self.exec_calls
            .lock()
            .unwrap()
            .push((pod.clone(), container.to_string(), command.to_vec()));

        match self.exec.get(&(pod.name.clone(), container.to_string())) {
            Some(ExecBehavior::Output(output)) => Ok(output.clone()),
            Some(ExecBehavior::Fail) => Err(ClientError::Stream("upgrade failed".to_string())),
            Some(ExecBehavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ClientError::Stream("hung exec finished".to_string()))
            }
            None => Ok(ExecOutput::default()),
        }
    }

    async fn patch_workload(&self, target: &WorkloadRef, patch: &PatchDocument) -> Result<()> {
        if self.reject_patches_for.contains(&target.name) {
            return Err(ClientError::Status {
                status: 422,
                message: "spec.template.spec.volumes: Invalid value".to_string(),
            });
        }
        self.patches
            .lock()
            .unwrap()
            .push((target.clone(), patch.clone()));
        Ok(())
    }
}

/// Workload named `name` with one container of the same name
pub fn workload(
    kind: WorkloadKind,
    namespace: &str,
    name: &str,
    enabled: Option<&str>,
    ready_replicas: i32,
) -> Workload {
    Workload {
        id: WorkloadRef::new(kind, namespace, name),
        annotations: enabled.map(|v| {
            let mut annotations = BTreeMap::new();
            annotations.insert(ANNOTATION_AUTO_MAPPING_ENABLED.to_string(), v.to_string());
            annotations
        }),
        ready_replicas,
        selector: BTreeMap::from([("app".to_string(), name.to_string())]),
        template: PodTemplate {
            containers: vec![ContainerSpec::new(name)],
            volumes: vec![],
        },
    }
}
