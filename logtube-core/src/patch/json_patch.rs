//! Index-addressed JSON Patch rendering
//!
//! Indices are resolved against a snapshot of the pod template, advanced
//! through every operation already emitted. The result is only valid for the
//! exact object the snapshot was taken from.

use serde::Serialize;

use super::wire::{EnvEntry, MountEntry, VolumeEntry};
use super::{PatchError, PatchOp, WorkloadPatch};
use crate::domain::PodTemplate;

const POD_SPEC: &str = "/spec/template/spec";

/// One RFC 6902 operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum JsonPatchOp {
    Add {
        path: String,
        value: serde_json::Value,
    },
    Remove {
        path: String,
    },
    Replace {
        path: String,
        value: serde_json::Value,
    },
}

/// Renders a patch as index-addressed operations against `snapshot`
///
/// Mount removals come first, then volume removals, then additions. Removals
/// are emitted from the highest index down. An addition whose key already
/// exists becomes a `replace` at that index; otherwise it appends, creating
/// the array when the snapshot list is empty.
pub fn render_json_patch(
    patch: &WorkloadPatch,
    snapshot: &PodTemplate,
) -> Result<Vec<JsonPatchOp>, PatchError> {
    let mut working = snapshot.clone();
    let mut out = Vec::new();

    let mut mount_removals = Vec::new();
    for op in &patch.ops {
        if let PatchOp::RemoveContainerMountByPath(rm) = op {
            let ci = container_index(&working, &rm.container)?;
            let mi = working.containers[ci]
                .volume_mounts
                .iter()
                .position(|m| m.mount_path == rm.mount_path)
                .ok_or_else(|| PatchError::UnknownMount {
                    container: rm.container.clone(),
                    mount_path: rm.mount_path.clone(),
                })?;
            mount_removals.push((ci, mi));
        }
    }
    mount_removals.sort_unstable_by(|a, b| b.cmp(a));
    mount_removals.dedup();
    for (ci, mi) in mount_removals {
        out.push(JsonPatchOp::Remove {
            path: format!("{}/containers/{}/volumeMounts/{}", POD_SPEC, ci, mi),
        });
        working.containers[ci].volume_mounts.remove(mi);
    }

    let mut volume_removals = Vec::new();
    for op in &patch.ops {
        if let PatchOp::RemoveVolumeByName(rm) = op {
            let vi = working
                .volumes
                .iter()
                .position(|v| v.name == rm.name)
                .ok_or_else(|| PatchError::UnknownVolume(rm.name.clone()))?;
            volume_removals.push(vi);
        }
    }
    volume_removals.sort_unstable_by(|a, b| b.cmp(a));
    volume_removals.dedup();
    for vi in volume_removals {
        out.push(JsonPatchOp::Remove {
            path: format!("{}/volumes/{}", POD_SPEC, vi),
        });
        working.volumes.remove(vi);
    }

    for op in &patch.ops {
        match op {
            PatchOp::AddVolume(add) => {
                let value = serde_json::to_value(VolumeEntry::from(&add.volume))?;
                let existing = working.volumes.iter().position(|v| v.name == add.volume.name);
                out.push(upsert(
                    format!("{}/volumes", POD_SPEC),
                    existing,
                    working.volumes.is_empty(),
                    value,
                ));
                match existing {
                    Some(vi) => working.volumes[vi] = add.volume.clone(),
                    None => working.volumes.push(add.volume.clone()),
                }
            }
            PatchOp::AddContainerMount(add) => {
                let ci = container_index(&working, &add.container)?;
                let mounts = &mut working.containers[ci].volume_mounts;
                let value = serde_json::to_value(MountEntry::from(&add.mount))?;
                let existing = mounts
                    .iter()
                    .position(|m| m.mount_path == add.mount.mount_path);
                out.push(upsert(
                    format!("{}/containers/{}/volumeMounts", POD_SPEC, ci),
                    existing,
                    mounts.is_empty(),
                    value,
                ));
                match existing {
                    Some(mi) => mounts[mi] = add.mount.clone(),
                    None => mounts.push(add.mount.clone()),
                }
            }
            PatchOp::AddContainerEnv(add) => {
                let ci = container_index(&working, &add.container)?;
                let env = &mut working.containers[ci].env;
                let value = serde_json::to_value(EnvEntry::from(&add.env))?;
                let existing = env.iter().position(|e| e.name == add.env.name);
                out.push(upsert(
                    format!("{}/containers/{}/env", POD_SPEC, ci),
                    existing,
                    env.is_empty(),
                    value,
                ));
                match existing {
                    Some(ei) => env[ei] = add.env.clone(),
                    None => env.push(add.env.clone()),
                }
            }
            PatchOp::RemoveVolumeByName(_) | PatchOp::RemoveContainerMountByPath(_) => {}
        }
    }

    Ok(out)
}

fn container_index(template: &PodTemplate, name: &str) -> Result<usize, PatchError> {
    template
        .containers
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| PatchError::UnknownContainer(name.to_string()))
}

fn upsert(
    array_path: String,
    existing: Option<usize>,
    array_empty: bool,
    value: serde_json::Value,
) -> JsonPatchOp {
    match existing {
        Some(idx) => JsonPatchOp::Replace {
            path: format!("{}/{}", array_path, idx),
            value,
        },
        None if array_empty => JsonPatchOp::Add {
            path: array_path,
            value: serde_json::Value::Array(vec![value]),
        },
        None => JsonPatchOp::Add {
            path: format!("{}/-", array_path),
            value,
        },
    }
}
