//! Auto-mapping patch construction

use super::{AddContainerMount, AddVolume, PatchError, PatchOp, WorkloadPatch};
use crate::VOLUME_NAME_AUTO_MAPPING;
use crate::domain::{HostPathSpec, VolumeMountSpec, VolumeSpec, WorkloadRef};

const HOST_PATH_DIRECTORY_OR_CREATE: &str = "DirectoryOrCreate";

/// Log directory found inside one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPath {
    pub container: String,
    pub path: String,
}

impl DiscoveredPath {
    pub fn new(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            path: path.into(),
        }
    }
}

/// Host directory backing the mapping volume of a workload
pub fn mapping_host_path(root: &str, namespace: &str, name: &str) -> String {
    format!("{}/{}-{}", root.trim_end_matches('/'), namespace, name)
}

/// Builds the patch that mounts the mapping volume at each discovered path
///
/// Entries with an empty path are ignored. Fails with
/// [`PatchError::NoVolumeMountsUpdated`] when no entry is left, so a workload
/// without any separable logs never gets a volume-only patch.
pub fn build_mapping_patch(
    target: &WorkloadRef,
    host_path_root: &str,
    discovered: &[DiscoveredPath],
) -> Result<WorkloadPatch, PatchError> {
    let mounts: Vec<&DiscoveredPath> = discovered
        .iter()
        .filter(|d| !d.path.is_empty())
        .collect();

    if mounts.is_empty() {
        return Err(PatchError::NoVolumeMountsUpdated);
    }

    let mut patch = WorkloadPatch::new(target.clone());
    patch.push(PatchOp::AddVolume(AddVolume {
        volume: VolumeSpec {
            name: VOLUME_NAME_AUTO_MAPPING.to_string(),
            host_path: Some(HostPathSpec {
                path: mapping_host_path(host_path_root, &target.namespace, &target.name),
                type_: Some(HOST_PATH_DIRECTORY_OR_CREATE.to_string()),
            }),
        },
    }));

    for d in mounts {
        patch.push(PatchOp::AddContainerMount(AddContainerMount {
            container: d.container.clone(),
            mount: VolumeMountSpec {
                name: VOLUME_NAME_AUTO_MAPPING.to_string(),
                mount_path: d.path.clone(),
            },
        }));
    }

    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkloadKind;

    fn target() -> WorkloadRef {
        WorkloadRef::new(WorkloadKind::Deployment, "prod", "web")
    }

    #[test]
    fn test_host_path_ignores_trailing_slash() {
        assert_eq!(mapping_host_path("/data/logs", "prod", "web"), "/data/logs/prod-web");
        assert_eq!(mapping_host_path("/data/logs/", "prod", "web"), "/data/logs/prod-web");
    }

    #[test]
    fn test_builds_volume_and_mount() {
        let patch = build_mapping_patch(
            &target(),
            "/data/logs",
            &[DiscoveredPath::new("web", "/var/log/web")],
        )
        .unwrap();

        assert_eq!(patch.ops.len(), 2);
        match &patch.ops[0] {
            PatchOp::AddVolume(add) => {
                assert_eq!(add.volume.name, VOLUME_NAME_AUTO_MAPPING);
                let host_path = add.volume.host_path.as_ref().unwrap();
                assert_eq!(host_path.path, "/data/logs/prod-web");
                assert_eq!(host_path.type_.as_deref(), Some("DirectoryOrCreate"));
            }
            other => panic!("unexpected op: {:?}", other),
        }
        match &patch.ops[1] {
            PatchOp::AddContainerMount(add) => {
                assert_eq!(add.container, "web");
                assert_eq!(add.mount.mount_path, "/var/log/web");
                assert_eq!(add.mount.name, VOLUME_NAME_AUTO_MAPPING);
            }
            other => panic!("unexpected op: {:?}", other),
        }
    }

    #[test]
    fn test_empty_paths_are_skipped() {
        let patch = build_mapping_patch(
            &target(),
            "/data/logs",
            &[
                DiscoveredPath::new("sidecar", ""),
                DiscoveredPath::new("web", "/var/log/web"),
            ],
        )
        .unwrap();
        assert_eq!(patch.ops.len(), 2);
    }

    #[test]
    fn test_no_mounts_is_an_error() {
        let err = build_mapping_patch(&target(), "/data/logs", &[DiscoveredPath::new("web", "")])
            .unwrap_err();
        assert!(matches!(err, PatchError::NoVolumeMountsUpdated));

        let err = build_mapping_patch(&target(), "/data/logs", &[]).unwrap_err();
        assert!(matches!(err, PatchError::NoVolumeMountsUpdated));
    }

    #[test]
    fn test_build_is_deterministic() {
        let discovered = vec![
            DiscoveredPath::new("web", "/var/log/web"),
            DiscoveredPath::new("worker", "/app/logs"),
        ];
        let a = build_mapping_patch(&target(), "/data/logs", &discovered).unwrap();
        let b = build_mapping_patch(&target(), "/data/logs", &discovered).unwrap();
        assert_eq!(a, b);
    }
}
