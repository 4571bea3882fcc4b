//! Logtube cluster client
//!
//! The seam between the engine and the platform. [`ClusterClient`] covers
//! the four capabilities the engine consumes:
//! - enumerate namespaces and workloads
//! - enumerate pods matching a label selector
//! - execute a command inside a container of a pod
//! - submit a patch against a workload
//!
//! [`KubeClusterClient`] implements it on top of `kube`. Tests substitute
//! in-memory implementations.

pub mod convert;
pub mod error;
mod kubernetes;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use kubernetes::KubeClusterClient;

use async_trait::async_trait;
use logtube_core::domain::{PodInfo, PodRef, Workload, WorkloadKind, WorkloadRef};
use logtube_core::patch::PatchDocument;

/// Captured result of a command run inside a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Cluster capabilities consumed by the engine
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Lists the names of all namespaces
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Lists every workload of `kind` in `namespace`
    async fn list_workloads(&self, namespace: &str, kind: WorkloadKind) -> Result<Vec<Workload>>;

    /// Lists pods in `namespace` matching a `key=value,...` selector
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<PodInfo>>;

    /// Runs `command` inside `container` of `pod`
    ///
    /// A command that runs and exits non-zero is reported through
    /// [`ExecOutput::exit_code`], not as an error.
    async fn exec(&self, pod: &PodRef, container: &str, command: &[String]) -> Result<ExecOutput>;

    /// Submits a rendered patch against a workload
    async fn patch_workload(&self, target: &WorkloadRef, patch: &PatchDocument) -> Result<()>;
}
