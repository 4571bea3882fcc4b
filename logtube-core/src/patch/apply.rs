//! In-memory application of a patch
//!
//! Mirrors how the API server merges a strategic merge patch into a pod
//! template: elements are matched by merge key, an add replaces a matching
//! element or appends, a delete drops matching elements and is a no-op when
//! nothing matches. Operations on containers the template does not declare
//! are dropped; such patches never render.

use super::{PatchOp, WorkloadPatch};
use crate::domain::{ContainerSpec, PodTemplate};

impl WorkloadPatch {
    /// Returns `template` with every operation merged in
    pub fn apply(&self, template: &PodTemplate) -> PodTemplate {
        let mut out = template.clone();

        for op in &self.ops {
            match op {
                PatchOp::AddVolume(add) => {
                    match out.volumes.iter_mut().find(|v| v.name == add.volume.name) {
                        Some(existing) => *existing = add.volume.clone(),
                        None => out.volumes.push(add.volume.clone()),
                    }
                }
                PatchOp::RemoveVolumeByName(rm) => {
                    out.volumes.retain(|v| v.name != rm.name);
                }
                PatchOp::AddContainerMount(add) => {
                    let Some(container) = container_mut(&mut out, &add.container) else {
                        continue;
                    };
                    match container
                        .volume_mounts
                        .iter_mut()
                        .find(|m| m.mount_path == add.mount.mount_path)
                    {
                        Some(existing) => *existing = add.mount.clone(),
                        None => container.volume_mounts.push(add.mount.clone()),
                    }
                }
                PatchOp::RemoveContainerMountByPath(rm) => {
                    if let Some(container) = container_mut(&mut out, &rm.container) {
                        container
                            .volume_mounts
                            .retain(|m| m.mount_path != rm.mount_path);
                    }
                }
                PatchOp::AddContainerEnv(add) => {
                    let Some(container) = container_mut(&mut out, &add.container) else {
                        continue;
                    };
                    match container.env.iter_mut().find(|e| e.name == add.env.name) {
                        Some(existing) => *existing = add.env.clone(),
                        None => container.env.push(add.env.clone()),
                    }
                }
            }
        }

        out
    }
}

fn container_mut<'a>(template: &'a mut PodTemplate, name: &str) -> Option<&'a mut ContainerSpec> {
    template.containers.iter_mut().find(|c| c.name == name)
}
