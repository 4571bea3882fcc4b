//! Logtube Core
//!
//! Pure domain logic for the logtube auto-mapping tool.
//!
//! This crate contains:
//! - Domain types: workloads, pod templates and pods as seen by the engine
//! - Selector building for pod lookups
//! - Eligibility checks and representative pod/container selection
//! - Typed patch operations, their builders and wire renderings
//!
//! Nothing in here performs I/O; cluster access lives in `logtube-client`.

pub mod domain;
pub mod patch;
pub mod policy;
pub mod selector;

/// Annotation a workload sets to opt in to auto-mapping
pub const ANNOTATION_AUTO_MAPPING_ENABLED: &str = "io.github.logtube.auto-mapping/enabled";

/// Name of the host-path volume injected into every mapped workload
pub const VOLUME_NAME_AUTO_MAPPING: &str = "vol-logtube-auto-mapping";

/// Environment variable through which an image declares its log directory
pub const ENV_AUTO_MAPPING: &str = "LOGTUBE_K8S_AUTO_MAPPING";

/// Host-path substring identifying volumes of the legacy mapping convention
pub const LEGACY_HOST_PATH_MARKER: &str = "filebeat-collect-logs";
