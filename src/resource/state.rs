// ABOUTME: Recorded outcome of a successful provision.
// ABOUTME: Persisted between runs and handed back as the previous state.

use super::spec::{AppliedSpec, DeploymentSpec};
use crate::platform::ProvisionedWorkload;
use crate::types::{DeploymentName, WorkloadId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    pub name: DeploymentName,
    /// Publicly reachable address, always non-empty.
    pub url: String,
    pub workload: WorkloadId,
    pub applied: AppliedSpec,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentState {
    pub(crate) fn created(spec: &DeploymentSpec, provisioned: ProvisionedWorkload) -> Self {
        let now = Utc::now();
        Self {
            name: spec.name().clone(),
            url: provisioned.endpoint.url(),
            workload: provisioned.id,
            applied: spec.applied(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn updated(self, spec: &DeploymentSpec, provisioned: ProvisionedWorkload) -> Self {
        Self {
            url: provisioned.endpoint.url(),
            workload: provisioned.id,
            applied: spec.applied(),
            updated_at: Utc::now(),
            ..self
        }
    }

    /// Whether this state already satisfies `spec`.
    pub fn matches(&self, spec: &DeploymentSpec) -> bool {
        &self.name == spec.name()
            && &self.applied.image == spec.image()
            && self.applied.port == spec.port()
    }
}
