//! Run driver
//!
//! Walks namespaces, then workload kinds, then workloads, and for each
//! workload selects, discovers, builds and applies. Listing failures abort
//! the run. Everything that goes wrong inside a single workload is logged
//! and the walk moves on.

use anyhow::{Context, Result};
use logtube_client::{ClientError, ClusterClient};
use logtube_core::domain::{Workload, WorkloadKind, WorkloadRef};
use logtube_core::patch::{
    DiscoveredPath, PatchError, WorkloadPatch, build_mapping_patch, build_migration_patch,
};
use logtube_core::policy::{SelectionPolicy, SkipReason, check_eligibility};
use logtube_core::selector::build_selector;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{Config, Mode};
use crate::discovery::{DiscoveryError, LogPathDiscovery};

/// Failures confined to one workload
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("container {container}: {source}")]
    Discovery {
        container: String,
        #[source]
        source: DiscoveryError,
    },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("failed to apply patch: {0}")]
    Apply(#[source] ClientError),
}

/// What happened to one workload
#[derive(Debug)]
pub enum WorkloadOutcome {
    Skipped(SkipReason),
    Patched,
    /// Patch computed and logged but not submitted
    DryRun,
    Failed(WorkloadError),
}

/// Per-run tally of workload outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub patched: usize,
    pub dry_run: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunReport {
    fn record(&mut self, outcome: &WorkloadOutcome) {
        match outcome {
            WorkloadOutcome::Skipped(_) => self.skipped += 1,
            WorkloadOutcome::Patched => self.patched += 1,
            WorkloadOutcome::DryRun => self.dry_run += 1,
            WorkloadOutcome::Failed(_) => self.failed += 1,
        }
    }
}

enum Plan {
    Patch(WorkloadPatch),
    Skip(SkipReason),
    Fail(WorkloadError),
}

pub struct RunDriver {
    config: Config,
    client: Arc<dyn ClusterClient>,
    discovery: Box<dyn LogPathDiscovery>,
    policy: Box<dyn SelectionPolicy>,
}

impl RunDriver {
    pub fn new(
        config: Config,
        client: Arc<dyn ClusterClient>,
        discovery: Box<dyn LogPathDiscovery>,
        policy: Box<dyn SelectionPolicy>,
    ) -> Self {
        Self {
            config,
            client,
            discovery,
            policy,
        }
    }

    /// Processes the whole cluster once
    pub async fn run(&self) -> Result<RunReport> {
        let span = info_span!(
            "run",
            mode = %self.config.mode,
            dry_run = self.config.dry_run
        );
        self.run_batch().instrument(span).await
    }

    async fn run_batch(&self) -> Result<RunReport> {
        let namespaces = self
            .client
            .list_namespaces()
            .await
            .context("Failed to list namespaces")?;

        let mut report = RunReport::default();

        for namespace in &namespaces {
            info!("namespace: [{}]", namespace);

            for kind in WorkloadKind::ALL {
                let workloads = self
                    .client
                    .list_workloads(namespace, kind)
                    .await
                    .with_context(|| format!("Failed to list {}s in {}", kind, namespace))?;

                for workload in &workloads {
                    let outcome = self.process_workload(workload).await?;
                    log_outcome(&workload.id, &outcome);
                    report.record(&outcome);
                }
            }
        }

        info!(
            "Run finished: {} patched, {} dry-run, {} skipped, {} failed",
            report.patched, report.dry_run, report.skipped, report.failed
        );

        Ok(report)
    }

    /// Runs one workload to an outcome
    ///
    /// Returns `Err` only for failures that must abort the run.
    async fn process_workload(&self, workload: &Workload) -> Result<WorkloadOutcome> {
        let plan = match self.config.mode {
            Mode::AutoMapping => self.plan_mapping(workload).await?,
            Mode::Migrate => plan_migration(workload),
        };

        let outcome = match plan {
            Plan::Patch(patch) => self.apply(workload, &patch).await,
            Plan::Skip(reason) => WorkloadOutcome::Skipped(reason),
            Plan::Fail(err) => WorkloadOutcome::Failed(err),
        };
        Ok(outcome)
    }

    async fn plan_mapping(&self, workload: &Workload) -> Result<Plan> {
        if let Err(reason) = check_eligibility(workload) {
            return Ok(Plan::Skip(reason));
        }

        let selector = build_selector(&workload.selector);
        let pods = self
            .client
            .list_pods(&workload.id.namespace, &selector)
            .await
            .with_context(|| format!("Failed to list pods for {}", workload.id))?;

        let Some(pod) = self.policy.representative_pod(&pods) else {
            return Ok(Plan::Skip(SkipReason::NoMatchingPods));
        };
        debug!("{}: representative pod {}", workload.id, pod.pod);

        let mut discovered = Vec::new();
        for container in self.policy.target_containers(workload, pod) {
            match self.discovery.discover(&pod.pod, container).await {
                Ok(Some(path)) => {
                    debug!("{}: container {} logs to {}", workload.id, container, path);
                    discovered.push(DiscoveredPath::new(container, path));
                }
                Ok(None) => {}
                Err(source) => {
                    return Ok(Plan::Fail(WorkloadError::Discovery {
                        container: container.to_string(),
                        source,
                    }));
                }
            }
        }

        match build_mapping_patch(&workload.id, &self.config.host_path_root, &discovered) {
            Ok(patch) => Ok(Plan::Patch(patch)),
            Err(err) => Ok(Plan::Fail(err.into())),
        }
    }

    async fn apply(&self, workload: &Workload, patch: &WorkloadPatch) -> WorkloadOutcome {
        let document = match patch.render(self.config.patch_format, &workload.template) {
            Ok(document) => document,
            Err(err) => return WorkloadOutcome::Failed(err.into()),
        };

        if self.config.dry_run {
            info!("{}: {} patch: {}", workload.id, document.format, document.body);
            return WorkloadOutcome::DryRun;
        }

        debug!("{}: {} patch: {}", workload.id, document.format, document.body);

        match self.client.patch_workload(&workload.id, &document).await {
            Ok(()) => WorkloadOutcome::Patched,
            Err(err) => WorkloadOutcome::Failed(WorkloadError::Apply(err)),
        }
    }
}

fn plan_migration(workload: &Workload) -> Plan {
    let patch = build_migration_patch(&workload.id, &workload.template);
    if patch.is_empty() {
        Plan::Skip(SkipReason::NothingToMigrate)
    } else {
        Plan::Patch(patch)
    }
}

fn log_outcome(id: &WorkloadRef, outcome: &WorkloadOutcome) {
    let line = disposition(outcome);
    match outcome {
        WorkloadOutcome::Failed(_) => error!(
            kind = %id.kind, namespace = %id.namespace, name = %id.name,
            "{}", line
        ),
        WorkloadOutcome::Skipped(SkipReason::EmptySelector) => warn!(
            kind = %id.kind, namespace = %id.namespace, name = %id.name,
            "{}", line
        ),
        _ => info!(
            kind = %id.kind, namespace = %id.namespace, name = %id.name,
            "{}", line
        ),
    }
}

/// Log message for a workload outcome
fn disposition(outcome: &WorkloadOutcome) -> String {
    match outcome {
        WorkloadOutcome::Skipped(reason) => format!("skipped: {}", reason),
        WorkloadOutcome::Patched => "patched".to_string(),
        WorkloadOutcome::DryRun => "patched (dry run)".to_string(),
        WorkloadOutcome::Failed(err) => format!("failed: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{CandidateProbeDiscovery, EnvVarDiscovery};
    use crate::testing::{FakeCluster, workload};
    use logtube_core::domain::{
        ContainerSpec, HostPathSpec, PodInfo, VolumeMountSpec, VolumeSpec,
    };
    use logtube_core::patch::PatchFormat;
    use logtube_core::policy::{ContainerScope, FirstPodPolicy};
    use serde_json::json;
    use std::time::Duration;

    fn driver(fake: &Arc<FakeCluster>, config: Config) -> RunDriver {
        let client: Arc<dyn ClusterClient> = fake.clone();
        let discovery = Box::new(EnvVarDiscovery::new(client.clone(), Duration::from_secs(5)));
        let policy = Box::new(FirstPodPolicy::new(config.container_scope));
        RunDriver::new(config, client, discovery, policy)
    }

    fn web_cluster(annotation: Option<&str>) -> FakeCluster {
        FakeCluster::new()
            .with_workload(workload(WorkloadKind::Deployment, "prod", "web", annotation, 2))
            .with_pod(
                &[("app", "web"), ("pod-template-hash", "7d4b9")],
                PodInfo::new("prod", "web-7d4b9-abcde", vec!["web".to_string()]),
            )
            .with_exec("web-7d4b9-abcde", "web", "/var/log/web\n")
    }

    #[tokio::test]
    async fn test_scenario_mapping_patch() {
        let fake = Arc::new(web_cluster(Some("true")));
        let report = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
            .run()
            .await
            .unwrap();

        assert_eq!(report.patched, 1);
        let patches = fake.patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].0, WorkloadRef::new(WorkloadKind::Deployment, "prod", "web"));
        assert_eq!(patches[0].1.format, PatchFormat::StrategicMerge);
        assert_eq!(
            patches[0].1.body,
            json!({
                "spec": {"template": {"spec": {
                    "volumes": [{
                        "name": "vol-logtube-auto-mapping",
                        "hostPath": {"path": "/data/logs/prod-web", "type": "DirectoryOrCreate"}
                    }],
                    "containers": [{
                        "name": "web",
                        "volumeMounts": [{
                            "name": "vol-logtube-auto-mapping",
                            "mountPath": "/var/log/web"
                        }]
                    }]
                }}}
            })
        );
    }

    #[tokio::test]
    async fn test_scenario_not_opted_in() {
        for annotation in [None, Some("false"), Some("nope")] {
            let fake = Arc::new(web_cluster(annotation));
            let report = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
                .run()
                .await
                .unwrap();

            assert_eq!(report.skipped, 1);
            assert!(fake.patches().is_empty());
            assert!(fake.exec_calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_not_opted_in_disposition() {
        let fake = Arc::new(web_cluster(None));
        let wl = workload(WorkloadKind::Deployment, "prod", "web", None, 2);
        let outcome = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
            .process_workload(&wl)
            .await
            .unwrap();

        assert!(matches!(outcome, WorkloadOutcome::Skipped(SkipReason::NotOptedIn)));
        assert_eq!(disposition(&outcome), "skipped: auto-mapping not enabled");
    }

    #[test]
    fn test_disposition_lines() {
        assert_eq!(disposition(&WorkloadOutcome::Patched), "patched");
        assert_eq!(disposition(&WorkloadOutcome::DryRun), "patched (dry run)");
        assert_eq!(
            disposition(&WorkloadOutcome::Failed(PatchError::NoVolumeMountsUpdated.into())),
            "failed: no volume mounts updated"
        );
    }

    #[tokio::test]
    async fn test_zero_ready_replicas_is_skipped() {
        let fake = Arc::new(
            FakeCluster::new().with_workload(workload(
                WorkloadKind::StatefulSet,
                "prod",
                "db",
                Some("true"),
                0,
            )),
        );
        let report = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
            .run()
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert!(fake.exec_calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_matching_pods_is_skipped() {
        let fake = Arc::new(
            FakeCluster::new()
                .with_workload(workload(WorkloadKind::Deployment, "prod", "web", Some("1"), 1))
                .with_pod(
                    &[("app", "other")],
                    PodInfo::new("prod", "other-1", vec!["other".to_string()]),
                ),
        );
        let report = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
            .run()
            .await
            .unwrap();
        assert_eq!(report, RunReport { skipped: 1, ..Default::default() });
    }

    #[tokio::test]
    async fn test_empty_discovery_is_not_applied() {
        let fake = Arc::new(
            FakeCluster::new()
                .with_workload(workload(WorkloadKind::Deployment, "prod", "web", Some("true"), 1))
                .with_pod(
                    &[("app", "web")],
                    PodInfo::new("prod", "web-1", vec!["web".to_string()]),
                )
                .with_exec("web-1", "web", "\n"),
        );
        let report = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
            .run()
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert!(fake.patches().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_submit() {
        let fake = Arc::new(web_cluster(Some("true")));
        let mut config = Config::new(Mode::AutoMapping, "/data/logs");
        config.dry_run = true;

        let report = driver(&fake, config).run().await.unwrap();
        assert_eq!(report.dry_run, 1);
        assert_eq!(fake.exec_calls().len(), 1);
        assert!(fake.patches().is_empty());
    }

    #[tokio::test]
    async fn test_workload_failures_are_isolated() {
        let fake = Arc::new(
            FakeCluster::new()
                .with_workload(workload(WorkloadKind::Deployment, "prod", "api", Some("true"), 1))
                .with_workload(workload(WorkloadKind::Deployment, "prod", "bad", Some("true"), 1))
                .with_workload(workload(WorkloadKind::Deployment, "prod", "web", Some("true"), 1))
                .with_pod(&[("app", "api")], PodInfo::new("prod", "api-1", vec!["api".to_string()]))
                .with_pod(&[("app", "bad")], PodInfo::new("prod", "bad-1", vec!["bad".to_string()]))
                .with_pod(&[("app", "web")], PodInfo::new("prod", "web-1", vec!["web".to_string()]))
                .with_exec_failure("api-1", "api")
                .with_exec("bad-1", "bad", "/var/log/bad")
                .with_exec("web-1", "web", "/var/log/web")
                .rejecting_patch_for("bad"),
        );
        let report = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
            .run()
            .await
            .unwrap();

        assert_eq!(report, RunReport { patched: 1, failed: 2, ..Default::default() });
        let patches = fake.patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].0.name, "web");
    }

    #[tokio::test]
    async fn test_probe_rejection_constructs_no_patch() {
        let fake = Arc::new(
            FakeCluster::new()
                .with_workload(workload(WorkloadKind::Deployment, "prod", "web", Some("true"), 1))
                .with_pod(&[("app", "web")], PodInfo::new("prod", "web-1", vec!["web".to_string()]))
                .with_exec("web-1", "web", "/etc/passwd\n"),
        );
        let config = Config::new(Mode::AutoMapping, "/data/logs");
        let client: Arc<dyn ClusterClient> = fake.clone();
        let discovery = Box::new(CandidateProbeDiscovery::new(client.clone(), Duration::from_secs(5)));
        let policy = Box::new(FirstPodPolicy::default());
        let report = RunDriver::new(config, client, discovery, policy)
            .run()
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert!(fake.patches().is_empty());
    }

    #[tokio::test]
    async fn test_all_containers_scope() {
        let mut wl = workload(WorkloadKind::Deployment, "prod", "web", Some("true"), 1);
        wl.template.containers.push(ContainerSpec::new("sidecar"));
        let fake = Arc::new(
            FakeCluster::new()
                .with_workload(wl)
                .with_pod(
                    &[("app", "web")],
                    PodInfo::new("prod", "web-1", vec!["web".to_string(), "sidecar".to_string()]),
                )
                .with_exec("web-1", "web", "/var/log/web")
                .with_exec("web-1", "sidecar", "/var/log/sidecar"),
        );
        let mut config = Config::new(Mode::AutoMapping, "/data/logs");
        config.container_scope = ContainerScope::All;
        config.patch_format = PatchFormat::JsonPatch;

        let report = driver(&fake, config).run().await.unwrap();
        assert_eq!(report.patched, 1);

        let patches = fake.patches();
        assert_eq!(patches[0].1.format, PatchFormat::JsonPatch);
        assert_eq!(
            patches[0].1.body,
            json!([
                {
                    "op": "add",
                    "path": "/spec/template/spec/volumes",
                    "value": [{
                        "name": "vol-logtube-auto-mapping",
                        "hostPath": {"path": "/data/logs/prod-web", "type": "DirectoryOrCreate"}
                    }]
                },
                {
                    "op": "add",
                    "path": "/spec/template/spec/containers/0/volumeMounts",
                    "value": [{"name": "vol-logtube-auto-mapping", "mountPath": "/var/log/web"}]
                },
                {
                    "op": "add",
                    "path": "/spec/template/spec/containers/1/volumeMounts",
                    "value": [{"name": "vol-logtube-auto-mapping", "mountPath": "/var/log/sidecar"}]
                }
            ])
        );
    }

    #[tokio::test]
    async fn test_injected_containers_are_not_patched() {
        let fake = Arc::new(
            FakeCluster::new()
                .with_workload(workload(WorkloadKind::Deployment, "prod", "web", Some("true"), 1))
                .with_pod(
                    &[("app", "web")],
                    PodInfo::new("prod", "web-1", vec!["web".to_string(), "injected".to_string()]),
                )
                .with_exec("web-1", "web", "/var/log/nginx\n")
                .with_exec("web-1", "injected", "/var/log/nginx\n"),
        );
        let mut config = Config::new(Mode::AutoMapping, "/data/logs");
        config.container_scope = ContainerScope::All;
        let client: Arc<dyn ClusterClient> = fake.clone();
        let discovery = Box::new(CandidateProbeDiscovery::new(client.clone(), Duration::from_secs(5)));
        let policy = Box::new(FirstPodPolicy::new(config.container_scope));
        let report = RunDriver::new(config, client, discovery, policy)
            .run()
            .await
            .unwrap();

        assert_eq!(report.patched, 1);
        let calls = fake.exec_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "web");

        let patches = fake.patches();
        let containers = &patches[0].1.body["spec"]["template"]["spec"]["containers"];
        assert_eq!(
            containers,
            &json!([{
                "name": "web",
                "volumeMounts": [{"name": "vol-logtube-auto-mapping", "mountPath": "/var/log/nginx"}]
            }])
        );
    }

    #[tokio::test]
    async fn test_named_scope_skips_proxy_listed_first() {
        let mut wl = workload(WorkloadKind::Deployment, "prod", "api", Some("true"), 1);
        wl.template.containers = vec![ContainerSpec::new("server")];
        let fake = Arc::new(
            FakeCluster::new()
                .with_workload(wl)
                .with_pod(
                    &[("app", "api")],
                    PodInfo::new(
                        "prod",
                        "api-1",
                        vec!["istio-proxy".to_string(), "server".to_string()],
                    ),
                )
                .with_exec("api-1", "istio-proxy", "/var/log/envoy")
                .with_exec("api-1", "server", "/srv/logs"),
        );
        let report = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
            .run()
            .await
            .unwrap();

        assert_eq!(report.patched, 1);
        let calls = fake.exec_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "server");
        assert_eq!(
            fake.patches()[0].1.body["spec"]["template"]["spec"]["containers"][0]["name"],
            "server"
        );
    }

    #[tokio::test]
    async fn test_empty_namespaces() {
        let fake = Arc::new(
            FakeCluster::new()
                .with_namespace("default")
                .with_namespace("kube-system"),
        );
        let report = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
            .run()
            .await
            .unwrap();
        assert_eq!(report, RunReport::default());
    }

    #[tokio::test]
    async fn test_namespace_list_failure_is_fatal() {
        let fake = Arc::new(web_cluster(Some("true")).failing_namespace_list());
        let result = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
            .run()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pod_list_failure_is_fatal() {
        let fake = Arc::new(web_cluster(Some("true")).failing_pod_list());
        let result = driver(&fake, Config::new(Mode::AutoMapping, "/data/logs"))
            .run()
            .await;
        assert!(result.is_err());
        assert!(fake.patches().is_empty());
    }

    fn legacy_workload(kind: WorkloadKind, namespace: &str, name: &str) -> Workload {
        let mut wl = workload(kind, namespace, name, None, 0);
        wl.template.volumes.push(VolumeSpec {
            name: "legacy-vol".to_string(),
            host_path: Some(HostPathSpec {
                path: format!("/var/filebeat-collect-logs/{}-{}", namespace, name),
                type_: None,
            }),
        });
        wl.template.containers[0].volume_mounts.push(VolumeMountSpec {
            name: "legacy-vol".to_string(),
            mount_path: "/data/logs".to_string(),
        });
        wl
    }

    #[tokio::test]
    async fn test_scenario_migration_patch() {
        let fake = Arc::new(FakeCluster::new().with_workload(legacy_workload(
            WorkloadKind::Deployment,
            "prod",
            "web",
        )));
        let report = driver(&fake, Config::new(Mode::Migrate, ""))
            .run()
            .await
            .unwrap();

        assert_eq!(report.patched, 1);
        assert!(fake.exec_calls().is_empty());
        assert_eq!(
            fake.patches()[0].1.body,
            json!({
                "spec": {"template": {"spec": {
                    "volumes": [{"name": "legacy-vol", "$patch": "delete"}],
                    "containers": [{
                        "name": "web",
                        "volumeMounts": [{"mountPath": "/data/logs", "$patch": "delete"}],
                        "env": [{"name": "LOGTUBE_K8S_AUTO_MAPPING", "value": "/data/logs"}]
                    }]
                }}}
            })
        );
    }

    #[tokio::test]
    async fn test_migration_covers_whole_batch() {
        let fake = Arc::new(
            FakeCluster::new()
                .with_workload(legacy_workload(WorkloadKind::Deployment, "a", "one"))
                .with_workload(legacy_workload(WorkloadKind::Deployment, "a", "two"))
                .with_workload(legacy_workload(WorkloadKind::StatefulSet, "b", "three"))
                .with_workload(workload(WorkloadKind::Deployment, "b", "clean", None, 1)),
        );
        let report = driver(&fake, Config::new(Mode::Migrate, ""))
            .run()
            .await
            .unwrap();

        assert_eq!(report, RunReport { patched: 3, skipped: 1, ..Default::default() });
        let names: Vec<String> = fake.patches().into_iter().map(|(id, _)| id.name).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_migrated_workload_is_left_alone() {
        let legacy = legacy_workload(WorkloadKind::Deployment, "prod", "web");
        let mut migrated = legacy.clone();
        migrated.template = build_migration_patch(&legacy.id, &legacy.template).apply(&legacy.template);

        let fake = Arc::new(FakeCluster::new().with_workload(migrated));
        let report = driver(&fake, Config::new(Mode::Migrate, ""))
            .run()
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert!(fake.patches().is_empty());
    }
}
