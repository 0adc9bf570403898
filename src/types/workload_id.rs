// ABOUTME: Platform-assigned identifier of the workload backing a deployment.
// ABOUTME: A container ID for Docker/Podman, a namespace for Kubernetes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[must_use = "IDs reference workloads and should not be ignored"]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadId(String);

impl WorkloadId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
