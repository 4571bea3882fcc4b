//! Workload patches
//!
//! A patch is a closed list of typed operations against a workload's pod
//! template. Operations are keyed by name or mount path, never by index; the
//! wire format is chosen only when the patch is rendered:
//!
//! - [`PatchFormat::StrategicMerge`]: a partial object using merge keys and
//!   `$patch: delete` directives. Reapplying it is a no-op.
//! - [`PatchFormat::JsonPatch`]: an index-addressed operation list computed
//!   against a snapshot of the pod template. If the object changes between
//!   the snapshot and submission the operations hit the wrong elements, so a
//!   JSON patch must never be reapplied without re-reading the object.

mod apply;
mod builder;
mod json_patch;
mod migrate;
mod strategic;
mod wire;

pub use builder::{DiscoveredPath, build_mapping_patch, mapping_host_path};
pub use json_patch::{JsonPatchOp, render_json_patch};
pub use migrate::{build_migration_patch, is_legacy_volume};
pub use strategic::render_strategic_merge;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::{EnvVarSpec, PodTemplate, VolumeMountSpec, VolumeSpec, WorkloadRef};

/// Errors raised while building or rendering a patch
#[derive(Debug, Error)]
pub enum PatchError {
    /// No container produced a mount, so there is nothing worth submitting
    #[error("no volume mounts updated")]
    NoVolumeMountsUpdated,

    #[error("container not found in pod template: {0}")]
    UnknownContainer(String),

    #[error("volume not found in pod template: {0}")]
    UnknownVolume(String),

    #[error("mount {mount_path} not found in container {container}")]
    UnknownMount {
        container: String,
        mount_path: String,
    },

    #[error("failed to serialize patch: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A single pod template mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    AddVolume(AddVolume),
    RemoveVolumeByName(RemoveVolumeByName),
    AddContainerMount(AddContainerMount),
    RemoveContainerMountByPath(RemoveContainerMountByPath),
    AddContainerEnv(AddContainerEnv),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddVolume {
    pub volume: VolumeSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveVolumeByName {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddContainerMount {
    pub container: String,
    pub mount: VolumeMountSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveContainerMountByPath {
    pub container: String,
    pub mount_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddContainerEnv {
    pub container: String,
    pub env: EnvVarSpec,
}

/// The full set of operations for one workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadPatch {
    pub target: WorkloadRef,
    pub ops: Vec<PatchOp>,
}

impl WorkloadPatch {
    pub fn new(target: WorkloadRef) -> Self {
        Self {
            target,
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: PatchOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Renders the patch in the given wire format
    ///
    /// Every container an operation adds to must be declared in `snapshot`;
    /// a merge would otherwise append an image-less container that the API
    /// server rejects. [`PatchFormat::JsonPatch`] also resolves its indices
    /// against `snapshot`.
    pub fn render(
        &self,
        format: PatchFormat,
        snapshot: &PodTemplate,
    ) -> Result<PatchDocument, PatchError> {
        self.check_containers(snapshot)?;

        let body = match format {
            PatchFormat::StrategicMerge => render_strategic_merge(self)?,
            PatchFormat::JsonPatch => serde_json::to_value(render_json_patch(self, snapshot)?)?,
        };
        Ok(PatchDocument { format, body })
    }

    fn check_containers(&self, snapshot: &PodTemplate) -> Result<(), PatchError> {
        for op in &self.ops {
            let container = match op {
                PatchOp::AddContainerMount(add) => &add.container,
                PatchOp::AddContainerEnv(add) => &add.container,
                _ => continue,
            };
            if snapshot.container(container).is_none() {
                return Err(PatchError::UnknownContainer(container.clone()));
            }
        }
        Ok(())
    }
}

/// Wire format of a rendered patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchFormat {
    #[default]
    StrategicMerge,
    JsonPatch,
}

impl fmt::Display for PatchFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchFormat::StrategicMerge => f.write_str("strategic-merge"),
            PatchFormat::JsonPatch => f.write_str("json-patch"),
        }
    }
}

/// A rendered patch ready for submission
#[derive(Debug, Clone, PartialEq)]
pub struct PatchDocument {
    pub format: PatchFormat,
    pub body: serde_json::Value,
}

impl std::str::FromStr for PatchFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strategic-merge" => Ok(PatchFormat::StrategicMerge),
            "json-patch" => Ok(PatchFormat::JsonPatch),
            other => Err(format!(
                "unknown patch format '{}', expected strategic-merge or json-patch",
                other
            )),
        }
    }
}
