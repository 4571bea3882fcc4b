//! Candidate-probe discovery
//!
//! Asks the container which of a fixed list of well-known log directories
//! exists. The answer becomes a host mount target, so anything that is not
//! exactly one of the candidates is rejected.

use async_trait::async_trait;
use logtube_client::ClusterClient;
use logtube_core::domain::PodRef;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{DiscoveryError, LogPathDiscovery, run_shell};

/// Known log locations, in probe order
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "/usr/local/tomcat/logs",
    "/opt/tomcat/logs",
    "/var/log/nginx",
    "/app/logs",
    "/var/log/app",
];

pub struct CandidateProbeDiscovery {
    client: Arc<dyn ClusterClient>,
    candidates: Vec<String>,
    timeout: Duration,
}

impl CandidateProbeDiscovery {
    pub fn new(client: Arc<dyn ClusterClient>, timeout: Duration) -> Self {
        Self::with_candidates(
            client,
            DEFAULT_CANDIDATES.iter().map(|c| c.to_string()).collect(),
            timeout,
        )
    }

    pub fn with_candidates(
        client: Arc<dyn ClusterClient>,
        candidates: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            candidates,
            timeout,
        }
    }

    /// Shell script echoing the first candidate that is a directory
    fn script(&self) -> String {
        let list = self
            .candidates
            .iter()
            .map(|c| format!("'{}'", c))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "for d in {}; do if [ -d \"$d\" ]; then echo \"$d\"; exit 0; fi; done",
            list
        )
    }

    /// Validates the first line of probe output against the candidates
    fn parse_response(&self, stdout: &str) -> Result<Option<String>, DiscoveryError> {
        let first = stdout.lines().next().unwrap_or("").trim();
        if first.is_empty() {
            return Ok(None);
        }

        match self.candidates.iter().find(|c| c.as_str() == first) {
            Some(candidate) => Ok(Some(candidate.clone())),
            None => Err(DiscoveryError::UnexpectedResponse(first.to_string())),
        }
    }
}

#[async_trait]
impl LogPathDiscovery for CandidateProbeDiscovery {
    async fn discover(&self, pod: &PodRef, container: &str) -> Result<Option<String>, DiscoveryError> {
        let stdout =
            run_shell(self.client.as_ref(), pod, container, &self.script(), self.timeout).await?;

        let path = self.parse_response(&stdout)?;
        if path.is_none() {
            debug!("{} container {} has no known log directory", pod, container);
        }
        Ok(path)
    }
}
