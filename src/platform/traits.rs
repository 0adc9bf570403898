// ABOUTME: Platform trait and the workload types that cross the platform boundary.
// ABOUTME: Find, create, update, delete, and list the workloads backing deployments.

use super::sealed::Sealed;
use crate::types::{DeploymentName, ImageRef, Port, WorkloadId};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Label carrying the deployment name on every managed workload.
pub const LABEL_NAME: &str = "productionapp.name";
/// Label marking a workload as managed by productionapp.
pub const LABEL_MANAGED: &str = "productionapp.managed";

/// What the platform should run for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    pub name: DeploymentName,
    pub image: ImageRef,
    pub port: Port,
    pub labels: BTreeMap<String, String>,
}

impl WorkloadSpec {
    pub fn new(name: DeploymentName, image: ImageRef, port: Port) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_NAME.to_string(), name.to_string());
        labels.insert(LABEL_MANAGED.to_string(), "true".to_string());
        Self {
            name,
            image,
            port,
            labels,
        }
    }
}

/// Where a provisioned workload can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    /// `None` means the scheme default (80 for http).
    pub port: Option<u16>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn url(&self) -> String {
        match self.port {
            Some(80) | None => format!("http://{}", self.host),
            Some(port) => format!("http://{}:{}", self.host, port),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// Result of a successful create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedWorkload {
    pub id: WorkloadId,
    pub endpoint: Endpoint,
}

/// A workload as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadSummary {
    pub id: WorkloadId,
    pub name: String,
    pub image: String,
    pub running: bool,
}

/// The external platform that runs images.
///
/// `create_workload` always creates; callers look for an existing workload
/// with [`Platform::find_workload`] first so a retried create never yields a
/// second workload for the same name.
#[async_trait]
pub trait Platform: Sealed + Send + Sync {
    /// Short backend name for logs and status output.
    fn kind(&self) -> &'static str;

    /// Find the managed workload for a deployment name, running or not.
    async fn find_workload(
        &self,
        name: &DeploymentName,
    ) -> Result<Option<WorkloadSummary>, PlatformError>;

    /// Create a new workload and wait until it has an endpoint.
    async fn create_workload(
        &self,
        spec: &WorkloadSpec,
    ) -> Result<ProvisionedWorkload, PlatformError>;

    /// Replace image/port of an existing workload.
    ///
    /// On failure the existing workload keeps running with its old configuration.
    async fn update_workload(
        &self,
        id: &WorkloadId,
        spec: &WorkloadSpec,
    ) -> Result<ProvisionedWorkload, PlatformError>;

    /// Delete a workload. Returns `NotFound` if it does not exist.
    async fn delete_workload(&self, id: &WorkloadId) -> Result<(), PlatformError>;

    /// List all managed workloads.
    async fn list_workloads(&self) -> Result<Vec<WorkloadSummary>, PlatformError>;
}

/// Errors reported by a platform backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("platform rejected the request: {0}")]
    Rejected(String),

    #[error("workload not found: {0}")]
    NotFound(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("platform unreachable: {0}")]
    Connection(String),

    #[error("platform error: {0}")]
    Runtime(String),
}
