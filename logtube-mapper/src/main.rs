//! Logtube mapper
//!
//! Maps container log directories onto per-workload host directories, or
//! migrates workloads off the legacy volume-based mapping.

mod config;
mod discovery;
mod driver;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{Config, DiscoveryStrategy, Mode};
use driver::RunDriver;
use logtube_client::{ClusterClient, KubeClusterClient};
use logtube_core::patch::PatchFormat;
use logtube_core::policy::{ContainerScope, FirstPodPolicy, parse_bool_flag};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logtube-mapper")]
#[command(about = "Logtube host-path mapping for Kubernetes workloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount the mapping volume at each opted-in workload's log directory
    AutoMapping(AutoMappingArgs),
    /// Replace legacy mapping volumes with the LOGTUBE_K8S_AUTO_MAPPING variable
    Migrate(MigrateArgs),
}

#[derive(Args)]
struct AutoMappingArgs {
    /// Log patches instead of submitting them
    #[arg(
        long,
        env = "AUTOMAPPING_DRY_RUN",
        default_value = "false",
        action = clap::ArgAction::Set,
        value_parser = parse_flag
    )]
    dry_run: bool,

    /// Host directory under which per-workload log directories are created
    #[arg(long, env = "LOGTUBE_LOGS_HOST_PATH", default_value = "")]
    host_path: String,

    /// How container log directories are discovered
    #[arg(long, env = "LOGTUBE_DISCOVERY", value_enum, default_value_t = DiscoveryStrategy::Env)]
    discovery: DiscoveryStrategy,

    /// Patch wire format
    #[arg(long, env = "LOGTUBE_PATCH_FORMAT", default_value_t = PatchFormat::StrategicMerge)]
    patch_format: PatchFormat,

    /// Which containers of the representative pod are probed
    #[arg(long, env = "LOGTUBE_CONTAINER_SCOPE", default_value_t = ContainerScope::Named)]
    container_scope: ContainerScope,

    /// Exec timeout in seconds
    #[arg(long, env = "LOGTUBE_EXEC_TIMEOUT", default_value_t = 30)]
    exec_timeout: u64,
}

#[derive(Args)]
struct MigrateArgs {
    /// Log patches instead of submitting them
    #[arg(
        long,
        env = "MIGRATE_LOGTUBE_MAPPING_DRY_RUN",
        default_value = "false",
        action = clap::ArgAction::Set,
        value_parser = parse_flag
    )]
    dry_run: bool,

    /// Patch wire format
    #[arg(long, env = "LOGTUBE_PATCH_FORMAT", default_value_t = PatchFormat::StrategicMerge)]
    patch_format: PatchFormat,
}

fn parse_flag(value: &str) -> Result<bool, String> {
    parse_bool_flag(value).ok_or_else(|| format!("invalid boolean '{}'", value))
}

impl From<Commands> for Config {
    fn from(command: Commands) -> Self {
        match command {
            Commands::AutoMapping(args) => Config {
                mode: Mode::AutoMapping,
                dry_run: args.dry_run,
                host_path_root: args.host_path,
                discovery: args.discovery,
                patch_format: args.patch_format,
                container_scope: args.container_scope,
                exec_timeout: Duration::from_secs(args.exec_timeout),
            },
            Commands::Migrate(args) => {
                let mut config = Config::new(Mode::Migrate, "");
                config.dry_run = args.dry_run;
                config.patch_format = args.patch_format;
                config
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logtube_mapper=info,logtube_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from(cli.command);

    tracing::info!("Starting logtube mapper ({})", config.mode);

    match run(config).await {
        Ok(()) => {
            tracing::info!("exited");
            Ok(())
        }
        Err(e) => {
            tracing::error!("exited with error: {:#}", e);
            Err(e)
        }
    }
}

async fn run(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let client: Arc<dyn ClusterClient> = Arc::new(
        KubeClusterClient::try_default()
            .await
            .context("Failed to create Kubernetes client")?,
    );

    let discovery =
        discovery::build_discovery(config.discovery, client.clone(), config.exec_timeout);
    let policy = Box::new(FirstPodPolicy::new(config.container_scope));

    RunDriver::new(config, client, discovery, policy).run().await?;
    Ok(())
}
