//! Pod domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a running pod
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A pod matching a workload selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub pod: PodRef,
    /// Container names in declaration order
    pub containers: Vec<String>,
}

impl PodInfo {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, containers: Vec<String>) -> Self {
        Self {
            pod: PodRef {
                namespace: namespace.into(),
                name: name.into(),
            },
            containers,
        }
    }
}
