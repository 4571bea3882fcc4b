//! Log-path discovery
//!
//! Runs a probe inside a live container and turns its output into a log
//! directory. "No path" is a normal answer and means the container is
//! skipped; errors abort discovery for the enclosing workload only.

mod env;
mod probe;

pub use env::EnvVarDiscovery;
pub use probe::CandidateProbeDiscovery;

use async_trait::async_trait;
use logtube_client::{ClientError, ClusterClient};
use logtube_core::domain::PodRef;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::DiscoveryStrategy;

/// Errors raised while probing a container
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Exec session could not be set up or drained
    #[error("exec failed: {0}")]
    Transport(#[from] ClientError),

    #[error("exec timed out after {0:?}")]
    Timeout(Duration),

    /// Probe ran but exited non-zero
    #[error("probe exited with code {exit_code}: {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// Probe answered with a path outside the known candidates
    #[error("unexpected probe response: {0:?}")]
    UnexpectedResponse(String),
}

/// Finds the log directory of one container
#[async_trait]
pub trait LogPathDiscovery: Send + Sync {
    /// Returns the container's log directory, or `None` if it declares none
    async fn discover(&self, pod: &PodRef, container: &str) -> Result<Option<String>, DiscoveryError>;
}

/// Builds the discovery strategy selected by configuration
pub fn build_discovery(
    strategy: DiscoveryStrategy,
    client: Arc<dyn ClusterClient>,
    timeout: Duration,
) -> Box<dyn LogPathDiscovery> {
    match strategy {
        DiscoveryStrategy::Env => Box::new(EnvVarDiscovery::new(client, timeout)),
        DiscoveryStrategy::Probe => Box::new(CandidateProbeDiscovery::new(client, timeout)),
    }
}

/// Runs `script` through `sh -c` and returns its stdout
///
/// The whole round trip is bounded by `timeout`.
async fn run_shell(
    client: &dyn ClusterClient,
    pod: &PodRef,
    container: &str,
    script: &str,
    timeout: Duration,
) -> Result<String, DiscoveryError> {
    let command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];

    let output = tokio::time::timeout(timeout, client.exec(pod, container, &command))
        .await
        .map_err(|_| DiscoveryError::Timeout(timeout))??;

    if !output.success() {
        return Err(DiscoveryError::CommandFailed {
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(output.stdout)
}
