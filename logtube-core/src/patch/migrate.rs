//! Migration from volume-based mapping to the environment-variable contract

use super::{
    AddContainerEnv, PatchOp, RemoveContainerMountByPath, RemoveVolumeByName, WorkloadPatch,
};
use crate::domain::{EnvVarSpec, PodTemplate, VolumeSpec, WorkloadRef};
use crate::{ENV_AUTO_MAPPING, LEGACY_HOST_PATH_MARKER};

/// Whether a volume belongs to the legacy mapping convention
pub fn is_legacy_volume(volume: &VolumeSpec) -> bool {
    volume
        .host_path
        .as_ref()
        .is_some_and(|h| h.path.contains(LEGACY_HOST_PATH_MARKER))
}

/// Builds the patch that retires legacy mapping volumes
///
/// Every legacy volume and every mount referencing one is deleted. Each
/// affected container gets one `LOGTUBE_K8S_AUTO_MAPPING` entry carrying the
/// path of its first legacy mount. The result is empty when the template has
/// no legacy volumes, which makes a second run a no-op.
pub fn build_migration_patch(target: &WorkloadRef, template: &PodTemplate) -> WorkloadPatch {
    let mut patch = WorkloadPatch::new(target.clone());

    let legacy: Vec<&str> = template
        .volumes
        .iter()
        .filter(|v| is_legacy_volume(v))
        .map(|v| v.name.as_str())
        .collect();

    for name in &legacy {
        patch.push(PatchOp::RemoveVolumeByName(RemoveVolumeByName {
            name: name.to_string(),
        }));
    }

    for container in &template.containers {
        let mut env_added = false;
        for mount in &container.volume_mounts {
            if !legacy.contains(&mount.name.as_str()) {
                continue;
            }
            patch.push(PatchOp::RemoveContainerMountByPath(
                RemoveContainerMountByPath {
                    container: container.name.clone(),
                    mount_path: mount.mount_path.clone(),
                },
            ));
            if !env_added {
                patch.push(PatchOp::AddContainerEnv(AddContainerEnv {
                    container: container.name.clone(),
                    env: EnvVarSpec {
                        name: ENV_AUTO_MAPPING.to_string(),
                        value: Some(mount.mount_path.clone()),
                    },
                }));
                env_added = true;
            }
        }
    }

    patch
}
