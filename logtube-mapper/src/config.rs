//! Mapper configuration
//!
//! Built once in `main` from command-line arguments and their environment
//! variables, validated, then handed to the run driver. No other component
//! reads the environment.

use clap::ValueEnum;
use logtube_core::patch::PatchFormat;
use logtube_core::policy::ContainerScope;
use std::fmt;
use std::time::Duration;

/// What the run does to each workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Discover log directories and mount the mapping volume
    AutoMapping,
    /// Replace legacy mapping volumes with the environment-variable contract
    Migrate,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::AutoMapping => f.write_str("auto-mapping"),
            Mode::Migrate => f.write_str("migrate"),
        }
    }
}

/// How a container's log directory is discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DiscoveryStrategy {
    /// Read `LOGTUBE_K8S_AUTO_MAPPING` from the container environment
    #[default]
    Env,
    /// Look for the first existing directory among known log locations
    Probe,
}

/// Run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,

    /// Compute and log patches without submitting them
    pub dry_run: bool,

    /// Host directory under which per-workload log directories are created
    pub host_path_root: String,

    pub discovery: DiscoveryStrategy,

    pub patch_format: PatchFormat,

    pub container_scope: ContainerScope,

    /// Upper bound for a single exec round trip
    pub exec_timeout: Duration,
}

impl Config {
    /// Creates a configuration for `mode` with defaults
    pub fn new(mode: Mode, host_path_root: impl Into<String>) -> Self {
        Self {
            mode,
            dry_run: false,
            host_path_root: host_path_root.into(),
            discovery: DiscoveryStrategy::default(),
            patch_format: PatchFormat::default(),
            container_scope: ContainerScope::default(),
            exec_timeout: Duration::from_secs(30),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mode == Mode::AutoMapping {
            if self.host_path_root.is_empty() {
                anyhow::bail!("missing environment variable: LOGTUBE_LOGS_HOST_PATH");
            }

            if !self.host_path_root.starts_with('/') {
                anyhow::bail!("host path root must be absolute: {}", self.host_path_root);
            }
        }

        if self.exec_timeout.is_zero() {
            anyhow::bail!("exec_timeout must be greater than 0");
        }

        Ok(())
    }
}
