//! Wire shapes shared by the patch renderers

use serde::Serialize;

use crate::domain::{EnvVarSpec, HostPathSpec, VolumeMountSpec, VolumeSpec};

pub(super) const DELETE_DIRECTIVE: &str = "delete";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VolumeEntry<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_path: Option<&'a HostPathSpec>,
    #[serde(rename = "$patch", skip_serializing_if = "Option::is_none")]
    pub directive: Option<&'static str>,
}

impl<'a> From<&'a VolumeSpec> for VolumeEntry<'a> {
    fn from(volume: &'a VolumeSpec) -> Self {
        Self {
            name: &volume.name,
            host_path: volume.host_path.as_ref(),
            directive: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MountEntry<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    pub mount_path: &'a str,
    #[serde(rename = "$patch", skip_serializing_if = "Option::is_none")]
    pub directive: Option<&'static str>,
}

impl<'a> From<&'a VolumeMountSpec> for MountEntry<'a> {
    fn from(mount: &'a VolumeMountSpec) -> Self {
        Self {
            name: Some(&mount.name),
            mount_path: &mount.mount_path,
            directive: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct EnvEntry<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<&'a str>,
}

impl<'a> From<&'a EnvVarSpec> for EnvEntry<'a> {
    fn from(env: &'a EnvVarSpec) -> Self {
        Self {
            name: &env.name,
            value: env.value.as_deref(),
        }
    }
}
