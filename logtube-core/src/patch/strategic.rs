//! Strategic merge rendering

use serde::Serialize;

use super::wire::{DELETE_DIRECTIVE, EnvEntry, MountEntry, VolumeEntry};
use super::{PatchError, PatchOp, WorkloadPatch};

#[derive(Debug, Serialize)]
struct Body<'a> {
    spec: Spec<'a>,
}

#[derive(Debug, Serialize)]
struct Spec<'a> {
    template: Template<'a>,
}

#[derive(Debug, Serialize)]
struct Template<'a> {
    spec: PodSpec<'a>,
}

#[derive(Debug, Default, Serialize)]
struct PodSpec<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<VolumeEntry<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    containers: Vec<ContainerEntry<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerEntry<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volume_mounts: Vec<MountEntry<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env: Vec<EnvEntry<'a>>,
}

impl<'a> PodSpec<'a> {
    fn container(&mut self, name: &'a str) -> &mut ContainerEntry<'a> {
        let idx = match self.containers.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                self.containers.push(ContainerEntry {
                    name,
                    volume_mounts: Vec::new(),
                    env: Vec::new(),
                });
                self.containers.len() - 1
            }
        };
        &mut self.containers[idx]
    }
}

/// Renders a patch as a strategic merge body
///
/// Containers appear in the order they are first touched. Volumes and
/// containers are keyed by `name`, mounts by `mountPath`, env by `name`.
pub fn render_strategic_merge(patch: &WorkloadPatch) -> Result<serde_json::Value, PatchError> {
    let mut pod_spec = PodSpec::default();

    for op in &patch.ops {
        match op {
            PatchOp::AddVolume(add) => pod_spec.volumes.push(VolumeEntry::from(&add.volume)),
            PatchOp::RemoveVolumeByName(rm) => pod_spec.volumes.push(VolumeEntry {
                name: &rm.name,
                host_path: None,
                directive: Some(DELETE_DIRECTIVE),
            }),
            PatchOp::AddContainerMount(add) => pod_spec
                .container(&add.container)
                .volume_mounts
                .push(MountEntry::from(&add.mount)),
            PatchOp::RemoveContainerMountByPath(rm) => {
                pod_spec
                    .container(&rm.container)
                    .volume_mounts
                    .push(MountEntry {
                        name: None,
                        mount_path: &rm.mount_path,
                        directive: Some(DELETE_DIRECTIVE),
                    })
            }
            PatchOp::AddContainerEnv(add) => pod_spec
                .container(&add.container)
                .env
                .push(EnvEntry::from(&add.env)),
        }
    }

    let body = Body {
        spec: Spec {
            template: Template { spec: pod_spec },
        },
    };
    Ok(serde_json::to_value(body)?)
}
