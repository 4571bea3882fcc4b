//! Environment-variable discovery
//!
//! Trusts the image to export its log directory in `LOGTUBE_K8S_AUTO_MAPPING`.

use async_trait::async_trait;
use logtube_client::ClusterClient;
use logtube_core::ENV_AUTO_MAPPING;
use logtube_core::domain::PodRef;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{DiscoveryError, LogPathDiscovery, run_shell};

pub struct EnvVarDiscovery {
    client: Arc<dyn ClusterClient>,
    variable: String,
    timeout: Duration,
}

impl EnvVarDiscovery {
    pub fn new(client: Arc<dyn ClusterClient>, timeout: Duration) -> Self {
        Self {
            client,
            variable: ENV_AUTO_MAPPING.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl LogPathDiscovery for EnvVarDiscovery {
    async fn discover(&self, pod: &PodRef, container: &str) -> Result<Option<String>, DiscoveryError> {
        let script = format!("echo ${{{}}}", self.variable);
        let stdout = run_shell(self.client.as_ref(), pod, container, &script, self.timeout).await?;

        let path = stdout.trim();
        if path.is_empty() {
            debug!("{} container {} does not set {}", pod, container, self.variable);
            return Ok(None);
        }

        Ok(Some(path.to_string()))
    }
}
