// ABOUTME: In-process platform backend with failure injection.
// ABOUTME: Tracks every workload so tests can count live workloads per name.

use super::sealed::Sealed;
use super::traits::{
    Endpoint, Platform, PlatformError, ProvisionedWorkload, WorkloadSpec, WorkloadSummary,
};
use crate::types::{DeploymentName, ImageRef, Port, WorkloadId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

const FIRST_HOST_PORT: u16 = 30000;

/// A workload held by [`MemoryPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryWorkload {
    pub id: WorkloadId,
    pub name: DeploymentName,
    pub image: ImageRef,
    pub port: Port,
    pub host_port: u16,
}

#[derive(Debug, Default)]
struct Calls {
    create: usize,
    update: usize,
    delete: usize,
}

#[derive(Debug, Default)]
struct Inner {
    workloads: BTreeMap<WorkloadId, MemoryWorkload>,
    next_id: u64,
    next_host_port: u16,
    missing_images: HashSet<String>,
    fail_create: Option<PlatformError>,
    fail_update: Option<PlatformError>,
    fail_delete: Option<PlatformError>,
    calls: Calls,
}

impl Inner {
    fn allocate(&mut self) -> (WorkloadId, u16) {
        self.next_id += 1;
        let host_port = FIRST_HOST_PORT.saturating_add(self.next_host_port);
        self.next_host_port = self.next_host_port.wrapping_add(1);
        (WorkloadId::new(format!("mem-{:06}", self.next_id)), host_port)
    }

    fn check_image(&self, image: &ImageRef) -> Result<(), PlatformError> {
        if self.missing_images.contains(&image.to_string()) {
            return Err(PlatformError::ImageNotFound(image.to_string()));
        }
        Ok(())
    }
}

/// Platform that keeps workloads in memory.
///
/// Mutations are applied only after the optional latency has elapsed, so a
/// cancelled call never leaves a half-applied workload behind.
#[derive(Debug)]
pub struct MemoryPlatform {
    inner: Mutex<Inner>,
    host: String,
    latency: Option<Duration>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            host: "localhost".to_string(),
            latency: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Delay every mutating call, to exercise cancellation and lock contention.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make pulls of `image` fail with `ImageNotFound`.
    pub fn mark_image_missing(&self, image: &str) {
        self.inner.lock().missing_images.insert(image.to_string());
    }

    pub fn fail_next_create(&self, error: PlatformError) {
        self.inner.lock().fail_create = Some(error);
    }

    pub fn fail_next_update(&self, error: PlatformError) {
        self.inner.lock().fail_update = Some(error);
    }

    pub fn fail_next_delete(&self, error: PlatformError) {
        self.inner.lock().fail_delete = Some(error);
    }

    /// Insert a workload directly, as if left behind by an interrupted run.
    pub fn insert_orphan(&self, spec: &WorkloadSpec) -> WorkloadId {
        let mut inner = self.inner.lock();
        let (id, host_port) = inner.allocate();
        inner.workloads.insert(
            id.clone(),
            MemoryWorkload {
                id: id.clone(),
                name: spec.name.clone(),
                image: spec.image.clone(),
                port: spec.port,
                host_port,
            },
        );
        id
    }

    /// Remove a workload behind the resource's back.
    pub fn vanish(&self, id: &WorkloadId) {
        self.inner.lock().workloads.remove(id);
    }

    pub fn workloads(&self) -> Vec<MemoryWorkload> {
        self.inner.lock().workloads.values().cloned().collect()
    }

    pub fn live_count(&self, name: &DeploymentName) -> usize {
        self.inner
            .lock()
            .workloads
            .values()
            .filter(|w| &w.name == name)
            .count()
    }

    pub fn create_calls(&self) -> usize {
        self.inner.lock().calls.create
    }

    pub fn update_calls(&self) -> usize {
        self.inner.lock().calls.update
    }

    pub fn delete_calls(&self) -> usize {
        self.inner.lock().calls.delete
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn endpoint(&self, host_port: u16) -> Endpoint {
        Endpoint::new(self.host.clone(), Some(host_port))
    }

    fn summary(workload: &MemoryWorkload) -> WorkloadSummary {
        WorkloadSummary {
            id: workload.id.clone(),
            name: workload.name.to_string(),
            image: workload.image.to_string(),
            running: true,
        }
    }
}

impl Sealed for MemoryPlatform {}

#[async_trait]
impl Platform for MemoryPlatform {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn find_workload(
        &self,
        name: &DeploymentName,
    ) -> Result<Option<WorkloadSummary>, PlatformError> {
        let inner = self.inner.lock();
        Ok(inner
            .workloads
            .values()
            .find(|w| &w.name == name)
            .map(Self::summary))
    }

    async fn create_workload(
        &self,
        spec: &WorkloadSpec,
    ) -> Result<ProvisionedWorkload, PlatformError> {
        self.delay().await;

        let mut inner = self.inner.lock();
        inner.calls.create += 1;
        if let Some(error) = inner.fail_create.take() {
            return Err(error);
        }
        inner.check_image(&spec.image)?;

        let (id, host_port) = inner.allocate();
        inner.workloads.insert(
            id.clone(),
            MemoryWorkload {
                id: id.clone(),
                name: spec.name.clone(),
                image: spec.image.clone(),
                port: spec.port,
                host_port,
            },
        );

        Ok(ProvisionedWorkload {
            id,
            endpoint: self.endpoint(host_port),
        })
    }

    async fn update_workload(
        &self,
        id: &WorkloadId,
        spec: &WorkloadSpec,
    ) -> Result<ProvisionedWorkload, PlatformError> {
        self.delay().await;

        let mut inner = self.inner.lock();
        inner.calls.update += 1;
        if let Some(error) = inner.fail_update.take() {
            return Err(error);
        }
        inner.check_image(&spec.image)?;
        if !inner.workloads.contains_key(id) {
            return Err(PlatformError::NotFound(id.to_string()));
        }

        let (_, host_port) = inner.allocate();
        let workload = inner
            .workloads
            .get_mut(id)
            .ok_or_else(|| PlatformError::NotFound(id.to_string()))?;
        workload.image = spec.image.clone();
        workload.port = spec.port;
        workload.host_port = host_port;

        Ok(ProvisionedWorkload {
            id: id.clone(),
            endpoint: self.endpoint(host_port),
        })
    }

    async fn delete_workload(&self, id: &WorkloadId) -> Result<(), PlatformError> {
        self.delay().await;

        let mut inner = self.inner.lock();
        inner.calls.delete += 1;
        if let Some(error) = inner.fail_delete.take() {
            return Err(error);
        }
        match inner.workloads.remove(id) {
            Some(_) => Ok(()),
            None => Err(PlatformError::NotFound(id.to_string())),
        }
    }

    async fn list_workloads(&self) -> Result<Vec<WorkloadSummary>, PlatformError> {
        let inner = self.inner.lock();
        Ok(inner.workloads.values().map(Self::summary).collect())
    }
}
