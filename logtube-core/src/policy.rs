//! Workload selection policy
//!
//! Decides which workloads are processed and which pod and containers stand
//! in for the whole workload during discovery.

use std::fmt;

use crate::ANNOTATION_AUTO_MAPPING_ENABLED;
use crate::domain::{PodInfo, Workload};

/// Why a workload was not processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Opt-in annotation absent, false or unparseable
    NotOptedIn,
    /// `status.readyReplicas` is zero, so there is no pod to introspect
    NoReadyReplicas,
    /// Empty pod selector would match unrelated pods
    EmptySelector,
    /// Selector matched no pods
    NoMatchingPods,
    /// Migration found no legacy-marked volumes
    NothingToMigrate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NotOptedIn => "auto-mapping not enabled",
            SkipReason::NoReadyReplicas => "status.readyReplicas == 0",
            SkipReason::EmptySelector => "no selector labels",
            SkipReason::NoMatchingPods => "no pods",
            SkipReason::NothingToMigrate => "no legacy volumes",
        };
        f.write_str(s)
    }
}

/// Parses a boolean flag using the classic literal set
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Runs the eligibility checks in order, stopping at the first failure
pub fn check_eligibility(workload: &Workload) -> Result<(), SkipReason> {
    let enabled = workload
        .annotation(ANNOTATION_AUTO_MAPPING_ENABLED)
        .and_then(parse_bool_flag)
        .unwrap_or(false);
    if !enabled {
        return Err(SkipReason::NotOptedIn);
    }

    if workload.ready_replicas <= 0 {
        return Err(SkipReason::NoReadyReplicas);
    }

    if workload.selector.is_empty() {
        return Err(SkipReason::EmptySelector);
    }

    Ok(())
}

/// Which containers of the representative pod get probed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerScope {
    /// The container named after the workload, else the first declared one
    #[default]
    Named,
    /// Every container in declaration order
    All,
}

impl std::str::FromStr for ContainerScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "named" => Ok(ContainerScope::Named),
            "all" => Ok(ContainerScope::All),
            other => Err(format!(
                "unknown container scope '{}', expected named or all",
                other
            )),
        }
    }
}

impl fmt::Display for ContainerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerScope::Named => f.write_str("named"),
            ContainerScope::All => f.write_str("all"),
        }
    }
}

/// Chooses the stand-ins used to introspect a workload
///
/// Implementations assume every replica of a workload shares the same
/// filesystem layout.
pub trait SelectionPolicy: Send + Sync {
    /// Picks the pod to introspect, or `None` if there is nothing to pick
    fn representative_pod<'a>(&self, pods: &'a [PodInfo]) -> Option<&'a PodInfo>;

    /// Lists the containers of `pod` to probe for `workload`
    ///
    /// Only containers declared in the workload's pod template qualify.
    /// Containers injected at admission exist in the pod alone and cannot be
    /// patched through the template.
    fn target_containers<'a>(&self, workload: &Workload, pod: &'a PodInfo) -> Vec<&'a str>;
}

/// Takes the first listed pod and applies a [`ContainerScope`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstPodPolicy {
    scope: ContainerScope,
}

impl FirstPodPolicy {
    pub fn new(scope: ContainerScope) -> Self {
        Self { scope }
    }
}

impl SelectionPolicy for FirstPodPolicy {
    fn representative_pod<'a>(&self, pods: &'a [PodInfo]) -> Option<&'a PodInfo> {
        pods.first()
    }

    fn target_containers<'a>(&self, workload: &Workload, pod: &'a PodInfo) -> Vec<&'a str> {
        match self.scope {
            ContainerScope::All => declared_containers(workload, pod),
            ContainerScope::Named => preferred_container(workload, pod).into_iter().collect(),
        }
    }
}

/// Pod containers that also appear in the workload's template, in pod order
fn declared_containers<'a>(workload: &Workload, pod: &'a PodInfo) -> Vec<&'a str> {
    pod.containers
        .iter()
        .map(String::as_str)
        .filter(|name| workload.template.container(name).is_some())
        .collect()
}

/// The container named like the workload, falling back to the first declared one
pub fn preferred_container<'a>(workload: &Workload, pod: &'a PodInfo) -> Option<&'a str> {
    let declared = declared_containers(workload, pod);
    declared
        .iter()
        .copied()
        .find(|name| *name == workload.id.name)
        .or_else(|| declared.first().copied())
}
