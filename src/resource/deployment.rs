// ABOUTME: DeploymentResource, the create/update/delete triad over one named workload.
// ABOUTME: Executes what the planner decides against a Platform; never retries internally.

use super::error::{ResourceError, ValidationError};
use super::plan::{Action, plan};
use super::spec::{DeploymentArgs, DeploymentSpec};
use super::state::DeploymentState;
use crate::platform::{Platform, PlatformError, ProvisionedWorkload};
use crate::types::DeploymentName;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Provisions deployments on a platform.
///
/// Holds no state of its own; the caller owns the previous [`DeploymentState`]
/// and is responsible for serializing calls for the same name.
#[derive(Clone)]
pub struct DeploymentResource {
    platform: Arc<dyn Platform>,
}

impl DeploymentResource {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Validate raw inputs, then provision.
    pub async fn provision_args(
        &self,
        name: &str,
        args: &DeploymentArgs,
        previous: Option<DeploymentState>,
    ) -> Result<DeploymentState, ResourceError> {
        let spec = DeploymentSpec::from_args(name, args)?;
        self.provision(&spec, previous).await
    }

    /// Bring the workload for `spec.name()` in line with `spec`.
    ///
    /// On error the platform is left as it was described by `previous`.
    pub async fn provision(
        &self,
        spec: &DeploymentSpec,
        previous: Option<DeploymentState>,
    ) -> Result<DeploymentState, ResourceError> {
        if let Some(prev) = previous.as_ref().filter(|p| &p.name != spec.name()) {
            return Err(ValidationError::NameMismatch {
                recorded: prev.name.to_string(),
                requested: spec.name().to_string(),
            }
            .into());
        }

        let action = plan(Some(spec), previous.as_ref());
        debug!(name = %spec.name(), %action, "planned");

        match (action, previous) {
            (Action::NoOp, Some(prev)) => Ok(prev),
            (Action::Update, Some(prev)) => self.update(spec, prev).await,
            _ => self.create(spec).await,
        }
    }

    async fn create(&self, spec: &DeploymentSpec) -> Result<DeploymentState, ResourceError> {
        let name = spec.name();
        let workload = spec.to_workload();

        let existing = self
            .platform
            .find_workload(name)
            .await
            .map_err(|e| provision_error(name, e))?;

        let provisioned = match existing {
            Some(orphan) => {
                info!(%name, workload = %orphan.id, "adopting existing workload");
                self.platform.update_workload(&orphan.id, &workload).await
            }
            None => self.platform.create_workload(&workload).await,
        }
        .map_err(|e| provision_error(name, e))?;

        let state = DeploymentState::created(spec, checked(name, provisioned)?);
        info!(%name, url = %state.url, "deployment created");
        Ok(state)
    }

    async fn update(
        &self,
        spec: &DeploymentSpec,
        previous: DeploymentState,
    ) -> Result<DeploymentState, ResourceError> {
        let name = spec.name();
        let workload = spec.to_workload();

        match self
            .platform
            .update_workload(&previous.workload, &workload)
            .await
        {
            Ok(provisioned) => {
                let state = previous.updated(spec, checked(name, provisioned)?);
                info!(%name, url = %state.url, "deployment updated");
                Ok(state)
            }
            Err(PlatformError::NotFound(_)) => {
                warn!(%name, workload = %previous.workload, "recorded workload is gone, recreating");
                let fresh = self.create(spec).await?;
                Ok(DeploymentState {
                    created_at: previous.created_at,
                    ..fresh
                })
            }
            Err(e) => Err(provision_error(name, e)),
        }
    }

    /// Delete the workload behind `state`, plus any stray workload with its name.
    ///
    /// A workload that is already gone counts as deleted.
    pub async fn teardown(&self, state: &DeploymentState) -> Result<(), ResourceError> {
        debug_assert_eq!(plan(None, Some(state)), Action::Delete);

        match self.platform.delete_workload(&state.workload).await {
            Ok(()) => {}
            Err(PlatformError::NotFound(_)) => {
                debug!(name = %state.name, workload = %state.workload, "workload already gone");
            }
            Err(e) => return Err(teardown_error(&state.name, e)),
        }

        self.teardown_name(&state.name).await?;
        info!(name = %state.name, "deployment destroyed");
        Ok(())
    }

    /// Delete every managed workload carrying `name`, recorded or not.
    ///
    /// Returns how many were deleted.
    pub async fn teardown_name(&self, name: &DeploymentName) -> Result<usize, ResourceError> {
        let workloads = self
            .platform
            .list_workloads()
            .await
            .map_err(|e| teardown_error(name, e))?;

        let mut deleted = 0;
        for workload in workloads.iter().filter(|w| w.name == name.as_str()) {
            match self.platform.delete_workload(&workload.id).await {
                Ok(()) => deleted += 1,
                Err(PlatformError::NotFound(_)) => {}
                Err(e) => return Err(teardown_error(name, e)),
            }
        }
        Ok(deleted)
    }
}

fn checked(
    name: &DeploymentName,
    provisioned: ProvisionedWorkload,
) -> Result<ProvisionedWorkload, ResourceError> {
    if provisioned.endpoint.host.is_empty() {
        return Err(provision_error(
            name,
            PlatformError::Runtime("platform assigned no endpoint".to_string()),
        ));
    }
    Ok(provisioned)
}

fn provision_error(name: &DeploymentName, source: PlatformError) -> ResourceError {
    ResourceError::Provision {
        name: name.to_string(),
        source,
    }
}

fn teardown_error(name: &DeploymentName, source: PlatformError) -> ResourceError {
    ResourceError::Teardown {
        name: name.to_string(),
        source,
    }
}
