// ABOUTME: Docker/Podman platform backend on top of bollard.
// ABOUTME: One container per deployment, published on an ephemeral host port, swapped blue/green on update.

use super::detection::{RuntimeInfo, RuntimeType};
use super::error::ConnectError;
use super::sealed::Sealed;
use super::traits::{
    Endpoint, LABEL_MANAGED, LABEL_NAME, Platform, PlatformError, ProvisionedWorkload,
    WorkloadSpec, WorkloadSummary,
};
use crate::types::{DeploymentName, ImageRef, WorkloadId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, ContainerSummaryStateEnum, HostConfig, PortBinding, PortMap,
    RestartPolicy, RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

const LABEL_SLOT: &str = "productionapp.slot";

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_pull_error(e: bollard::errors::Error, image: &ImageRef) -> PlatformError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => PlatformError::ImageNotFound(image.to_string()),
        bollard::errors::Error::DockerResponseServerError {
            status_code: 401 | 403,
            message,
        } => PlatformError::Rejected(format!("pull {}: {}", image, message)),
        _ => PlatformError::Runtime(format!("pull {}: {}", image, e)),
    }
}

fn map_container_error(e: bollard::errors::Error) -> PlatformError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => PlatformError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code: 400 | 403 | 409,
            message,
        } => PlatformError::Rejected(message.clone()),
        _ => PlatformError::Runtime(e.to_string()),
    }
}

fn is_conflict(e: &bollard::errors::Error) -> bool {
    matches!(
        e,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 409, ..
        }
    )
}

/// Blue/green slot of a container; an update always lands in the other slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Blue,
    Green,
}

impl Slot {
    fn from_label(value: Option<&str>) -> Self {
        match value {
            Some("green") => Slot::Green,
            _ => Slot::Blue,
        }
    }

    fn other(self) -> Self {
        match self {
            Slot::Blue => Slot::Green,
            Slot::Green => Slot::Blue,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Slot::Blue => "blue",
            Slot::Green => "green",
        }
    }
}

// =============================================================================
// BollardPlatform
// =============================================================================

/// Runs each deployment as a single container on a local Docker or Podman daemon.
pub struct BollardPlatform {
    client: Docker,
    runtime_type: RuntimeType,
    public_host: String,
    stop_timeout: Duration,
}

impl BollardPlatform {
    pub fn new(client: Docker, runtime_type: RuntimeType, public_host: impl Into<String>) -> Self {
        Self {
            client,
            runtime_type,
            public_host: public_host.into(),
            stop_timeout: Duration::from_secs(10),
        }
    }

    /// Connect to the socket found by [`super::detect_local`].
    ///
    /// `public_host` is the host name put into URLs; the container port is
    /// published on an ephemeral port of that host.
    pub fn connect(info: &RuntimeInfo, public_host: &str) -> Result<Self, ConnectError> {
        let client =
            Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| ConnectError::Docker {
                    message: e.to_string(),
                })?;
        Ok(Self::new(client, info.runtime_type, public_host))
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    fn container_name(name: &DeploymentName, slot: Slot) -> String {
        format!("productionapp-{}-{}", name, slot.as_str())
    }

    fn port_key(spec: &WorkloadSpec) -> String {
        format!("{}/tcp", spec.port)
    }

    /// A pinned host port survives container restarts; an empty one is
    /// reassigned by the daemon on every start.
    fn host_binding(host_port: Option<u16>) -> PortBinding {
        PortBinding {
            host_ip: None,
            host_port: Some(host_port.map(|p| p.to_string()).unwrap_or_default()),
        }
    }

    /// First host port published in `ports`, whatever the container port.
    fn first_host_port(ports: &PortMap) -> Option<u16> {
        let mut keys: Vec<&String> = ports.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| ports.get(key).cloned().flatten())
            .flatten()
            .find_map(|b| b.host_port.and_then(|p| p.parse::<u16>().ok()))
    }

    fn is_running(state: Option<ContainerSummaryStateEnum>) -> bool {
        matches!(state, Some(ContainerSummaryStateEnum::RUNNING))
    }

    /// Ask the OS for a currently unused port to pin a new container to.
    fn free_host_port() -> Option<u16> {
        let listener = std::net::TcpListener::bind(("0.0.0.0", 0)).ok()?;
        listener.local_addr().ok().map(|addr| addr.port())
    }

    async fn published_host_port(&self, id: &WorkloadId) -> Result<Option<u16>, PlatformError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_error)?;
        Ok(details
            .network_settings
            .and_then(|n| n.ports)
            .as_ref()
            .and_then(Self::first_host_port))
    }

    async fn pull(&self, image: &ImageRef) -> Result<(), PlatformError> {
        tracing::debug!(image = %image, "pulling image");
        let opts = CreateImageOptions {
            from_image: Some(image.to_string()),
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_pull_error(e, image))?;
        }
        Ok(())
    }

    /// Create (but do not start) the container for `spec` in `slot`.
    async fn create_stopped(
        &self,
        spec: &WorkloadSpec,
        slot: Slot,
        host_port: Option<u16>,
    ) -> Result<WorkloadId, PlatformError> {
        let port_key = Self::port_key(spec);

        let mut labels: HashMap<String, String> = spec.labels.clone().into_iter().collect();
        labels.insert(LABEL_SLOT.to_string(), slot.as_str().to_string());

        let mut port_bindings: PortMap = HashMap::new();
        port_bindings.insert(port_key.clone(), Some(vec![Self::host_binding(host_port)]));

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.to_string()),
            labels: Some(labels),
            exposed_ports: Some(vec![port_key]),
            host_config: Some(host_config),
            ..Default::default()
        };

        let container_name = Self::container_name(&spec.name, slot);
        let opts = || CreateContainerOptions {
            name: Some(container_name.clone()),
            ..Default::default()
        };

        match self
            .client
            .create_container(Some(opts()), body.clone())
            .await
        {
            Ok(response) => Ok(WorkloadId::new(response.id)),
            Err(e) if is_conflict(&e) => {
                // Leftover from an interrupted run occupying this slot.
                tracing::warn!(container = %container_name, "removing leftover container");
                self.remove(&WorkloadId::new(container_name.clone())).await?;
                let response = self
                    .client
                    .create_container(Some(opts()), body)
                    .await
                    .map_err(map_container_error)?;
                Ok(WorkloadId::new(response.id))
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(PlatformError::ImageNotFound(spec.image.to_string())),
            Err(e) => Err(map_container_error(e)),
        }
    }

    async fn start(&self, id: &WorkloadId) -> Result<(), PlatformError> {
        self.client
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(map_container_error)
    }

    async fn stop(&self, id: &WorkloadId) -> Result<(), PlatformError> {
        let opts = StopContainerOptions {
            t: Some(self.stop_timeout.as_secs() as i32),
            signal: None,
        };
        match self.client.stop_container(id.as_str(), Some(opts)).await {
            Ok(()) => Ok(()),
            // Already stopped.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_container_error(e)),
        }
    }

    async fn remove(&self, id: &WorkloadId) -> Result<(), PlatformError> {
        let opts = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_error)
    }

    /// Stop and remove, ignoring errors. Used on failure paths only.
    async fn discard(&self, id: &WorkloadId) {
        let _ = self.stop(id).await;
        if let Err(e) = self.remove(id).await {
            tracing::warn!(container = %id, error = %e, "failed to discard container");
        }
    }

    /// Read the slot label of an existing container.
    async fn slot_of(&self, id: &WorkloadId) -> Result<Slot, PlatformError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_error)?;
        let labels = details.config.and_then(|c| c.labels).unwrap_or_default();
        Ok(Slot::from_label(labels.get(LABEL_SLOT).map(String::as_str)))
    }

    /// Resolve the host port the daemon assigned to the container port.
    async fn endpoint(&self, id: &WorkloadId, spec: &WorkloadSpec) -> Result<Endpoint, PlatformError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_error)?;

        let host_port = details
            .network_settings
            .and_then(|n| n.ports)
            .and_then(|ports| ports.get(&Self::port_key(spec)).cloned().flatten())
            .and_then(|bindings| {
                bindings
                    .into_iter()
                    .find_map(|b| b.host_port.and_then(|p| p.parse::<u16>().ok()))
            })
            .ok_or_else(|| {
                PlatformError::Runtime(format!("no host port published for {}", spec.port))
            })?;

        Ok(Endpoint::new(self.public_host.clone(), Some(host_port)))
    }

    /// Start a created container and resolve its endpoint, discarding it on failure.
    async fn start_and_resolve(
        &self,
        id: &WorkloadId,
        spec: &WorkloadSpec,
    ) -> Result<Endpoint, PlatformError> {
        let result = match self.start(id).await {
            Ok(()) => self.endpoint(id, spec).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.discard(id).await;
        }
        result
    }

    async fn list_filtered(
        &self,
        labels: &[(&str, &str)],
    ) -> Result<Vec<WorkloadSummary>, PlatformError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in labels {
            filters
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: true,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(map_container_error)?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let labels = c.labels.unwrap_or_default();
                let running = Self::is_running(c.state);
                WorkloadSummary {
                    id: WorkloadId::new(c.id.unwrap_or_default()),
                    name: labels.get(LABEL_NAME).cloned().unwrap_or_default(),
                    image: c.image.unwrap_or_default(),
                    running,
                }
            })
            .collect())
    }

    /// Remove every container of `name` except `keep`.
    async fn remove_others(&self, name: &DeploymentName, keep: &WorkloadId) {
        let others = match self
            .list_filtered(&[(LABEL_NAME, name.as_str()), (LABEL_MANAGED, "true")])
            .await
        {
            Ok(others) => others,
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "could not list containers for cleanup");
                return;
            }
        };
        for other in others.iter().filter(|c| &c.id != keep) {
            tracing::debug!(container = %other.id, "removing superseded container");
            self.discard(&other.id).await;
        }
    }
}

impl Sealed for BollardPlatform {}

#[async_trait]
impl Platform for BollardPlatform {
    fn kind(&self) -> &'static str {
        match self.runtime_type {
            RuntimeType::Docker => "docker",
            RuntimeType::Podman => "podman",
        }
    }

    async fn find_workload(
        &self,
        name: &DeploymentName,
    ) -> Result<Option<WorkloadSummary>, PlatformError> {
        let mut found = self
            .list_filtered(&[(LABEL_NAME, name.as_str()), (LABEL_MANAGED, "true")])
            .await?;
        // Prefer the running container if an interrupted update left two.
        found.sort_by_key(|c| !c.running);
        Ok(found.into_iter().next())
    }

    async fn create_workload(
        &self,
        spec: &WorkloadSpec,
    ) -> Result<ProvisionedWorkload, PlatformError> {
        self.pull(&spec.image).await?;

        let id = self
            .create_stopped(spec, Slot::Blue, Self::free_host_port())
            .await?;
        let endpoint = self.start_and_resolve(&id, spec).await?;

        tracing::debug!(name = %spec.name, container = %id, "container running");
        Ok(ProvisionedWorkload { id, endpoint })
    }

    async fn update_workload(
        &self,
        id: &WorkloadId,
        spec: &WorkloadSpec,
    ) -> Result<ProvisionedWorkload, PlatformError> {
        let slot = self.slot_of(id).await?;
        self.pull(&spec.image).await?;

        // The replacement takes over the published port so the URL stays put.
        let host_port = match self.published_host_port(id).await? {
            Some(port) => Some(port),
            None => Self::free_host_port(),
        };
        let new_id = self.create_stopped(spec, slot.other(), host_port).await?;

        // Only one container per name may run; stop the old one before starting the new.
        if let Err(e) = self.stop(id).await {
            self.discard(&new_id).await;
            return Err(e);
        }

        let endpoint = match self.start_and_resolve(&new_id, spec).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::warn!(name = %spec.name, error = %e, "replacement failed, restarting previous container");
                if let Err(restart) = self.start(id).await {
                    tracing::warn!(container = %id, error = %restart, "previous container did not restart");
                    return Err(e);
                }
                match self.published_host_port(id).await {
                    Ok(port) if port == host_port => {}
                    Ok(port) => tracing::warn!(
                        container = %id,
                        before = ?host_port,
                        after = ?port,
                        "previous container came back on a different host port; recorded url is stale"
                    ),
                    Err(inspect) => tracing::warn!(container = %id, error = %inspect, "could not inspect restarted container"),
                }
                return Err(e);
            }
        };

        if let Err(e) = self.remove(id).await {
            tracing::warn!(container = %id, error = %e, "failed to remove previous container");
        }
        self.remove_others(&spec.name, &new_id).await;

        Ok(ProvisionedWorkload {
            id: new_id,
            endpoint,
        })
    }

    async fn delete_workload(&self, id: &WorkloadId) -> Result<(), PlatformError> {
        match self.stop(id).await {
            Ok(()) | Err(PlatformError::Rejected(_)) => {}
            Err(e) => return Err(e),
        }
        self.remove(id).await
    }

    async fn list_workloads(&self) -> Result<Vec<WorkloadSummary>, PlatformError> {
        self.list_filtered(&[(LABEL_MANAGED, "true")]).await
    }
}
