//! Core domain types
//!
//! These types describe the slice of cluster state the engine reads. They are
//! filled in by `logtube-client` from API objects and are never mutated in
//! place; changes are expressed as patches.

pub mod pod;
pub mod workload;

pub use pod::{PodInfo, PodRef};
pub use workload::{
    ContainerSpec, EnvVarSpec, HostPathSpec, PodTemplate, VolumeMountSpec, VolumeSpec, Workload,
    WorkloadKind, WorkloadRef,
};
