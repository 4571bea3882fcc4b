//! Conversion from API objects into the core model

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, Volume};
use logtube_core::domain::{
    ContainerSpec, EnvVarSpec, HostPathSpec, PodInfo, PodTemplate, VolumeMountSpec, VolumeSpec,
    Workload, WorkloadKind, WorkloadRef,
};

/// Converts a Deployment listed from `namespace`
pub fn workload_from_deployment(namespace: &str, deployment: Deployment) -> Workload {
    let meta = deployment.metadata;
    let (selector, pod_spec) = match deployment.spec {
        Some(spec) => (spec.selector.match_labels, spec.template.spec),
        None => (None, None),
    };

    Workload {
        id: WorkloadRef::new(
            WorkloadKind::Deployment,
            meta.namespace.unwrap_or_else(|| namespace.to_string()),
            meta.name.unwrap_or_default(),
        ),
        annotations: meta.annotations,
        ready_replicas: deployment
            .status
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0),
        selector: selector.unwrap_or_default(),
        template: pod_template(pod_spec),
    }
}

/// Converts a StatefulSet listed from `namespace`
pub fn workload_from_stateful_set(namespace: &str, stateful_set: StatefulSet) -> Workload {
    let meta = stateful_set.metadata;
    let (selector, pod_spec) = match stateful_set.spec {
        Some(spec) => (spec.selector.match_labels, spec.template.spec),
        None => (None, None),
    };

    Workload {
        id: WorkloadRef::new(
            WorkloadKind::StatefulSet,
            meta.namespace.unwrap_or_else(|| namespace.to_string()),
            meta.name.unwrap_or_default(),
        ),
        annotations: meta.annotations,
        ready_replicas: stateful_set
            .status
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0),
        selector: selector.unwrap_or_default(),
        template: pod_template(pod_spec),
    }
}

/// Converts a pod listed from `namespace`
pub fn pod_info(namespace: &str, pod: Pod) -> PodInfo {
    let containers = pod
        .spec
        .map(|spec| spec.containers.into_iter().map(|c| c.name).collect())
        .unwrap_or_default();

    PodInfo::new(
        pod.metadata
            .namespace
            .unwrap_or_else(|| namespace.to_string()),
        pod.metadata.name.unwrap_or_default(),
        containers,
    )
}

fn pod_template(spec: Option<PodSpec>) -> PodTemplate {
    let Some(spec) = spec else {
        return PodTemplate::default();
    };

    PodTemplate {
        containers: spec.containers.into_iter().map(container_spec).collect(),
        volumes: spec
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(volume_spec)
            .collect(),
    }
}

fn container_spec(container: Container) -> ContainerSpec {
    ContainerSpec {
        name: container.name,
        volume_mounts: container
            .volume_mounts
            .unwrap_or_default()
            .into_iter()
            .map(|m| VolumeMountSpec {
                name: m.name,
                mount_path: m.mount_path,
            })
            .collect(),
        env: container
            .env
            .unwrap_or_default()
            .into_iter()
            .map(|e| EnvVarSpec {
                name: e.name,
                value: e.value,
            })
            .collect(),
    }
}

fn volume_spec(volume: Volume) -> VolumeSpec {
    VolumeSpec {
        name: volume.name,
        host_path: volume.host_path.map(|h| HostPathSpec {
            path: h.path,
            type_: h.type_,
        }),
    }
}
