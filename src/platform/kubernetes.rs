// ABOUTME: Kubernetes platform backend on top of kube and k8s-openapi.
// ABOUTME: One namespace per deployment holding a Deployment and a LoadBalancer Service.

use super::error::ConnectError;
use super::sealed::Sealed;
use super::traits::{
    Endpoint, LABEL_MANAGED, LABEL_NAME, Platform, PlatformError, ProvisionedWorkload,
    WorkloadSpec, WorkloadSummary,
};
use crate::types::{DeploymentName, WorkloadId};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Namespace, PodSpec, PodTemplateSpec, Service, ServicePort,
    ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{DeleteParams, ListParams, ObjectMeta, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config as KubeConfig};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

const FIELD_MANAGER: &str = "productionapp";

fn map_kube_error(e: kube::Error) -> PlatformError {
    match e {
        kube::Error::Api(_) => PlatformError::Rejected(e.to_string()),
        _ => PlatformError::Connection(e.to_string()),
    }
}

/// Who owns the namespace a deployment name maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ownership {
    Absent,
    Managed,
    /// Exists but was not created by productionapp; never touched.
    Foreign,
}

fn ownership(namespace: Option<&Namespace>) -> Ownership {
    let Some(namespace) = namespace else {
        return Ownership::Absent;
    };
    let managed = namespace
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(LABEL_MANAGED))
        .is_some_and(|value| value == "true");
    match managed {
        true => Ownership::Managed,
        false => Ownership::Foreign,
    }
}

/// A rollout is done once the controller has seen the latest spec and every
/// desired replica runs it and is available.
fn rollout_complete(deployment: &Deployment) -> bool {
    let Some(ref status) = deployment.status else {
        return false;
    };
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let generation = deployment.metadata.generation.unwrap_or(0);

    status.observed_generation.unwrap_or(0) >= generation
        && status.updated_replicas.unwrap_or(0) == desired
        && status.available_replicas.unwrap_or(0) == desired
        && status.replicas.unwrap_or(0) == desired
}

/// Settings for the Kubernetes backend.
#[derive(Debug, Clone)]
pub struct KubeSettings {
    pub replicas: i32,
    pub service_port: i32,
    pub url_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for KubeSettings {
    fn default() -> Self {
        Self {
            replicas: 3,
            service_port: 80,
            url_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Runs each deployment in its own namespace, exposed through a LoadBalancer.
pub struct KubePlatform {
    client: Client,
    settings: KubeSettings,
}

impl KubePlatform {
    pub fn new(client: Client, settings: KubeSettings) -> Self {
        Self { client, settings }
    }

    /// Build a client from an explicit kubeconfig, or infer one
    /// (in-cluster service account, `$KUBECONFIG`, `~/.kube/config`).
    pub async fn connect(
        kubeconfig: Option<&Path>,
        settings: KubeSettings,
    ) -> Result<Self, ConnectError> {
        let to_error = |message: String| ConnectError::Kubernetes { message };

        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| to_error(format!("{}: {}", path.display(), e)))?;
                KubeConfig::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| to_error(e.to_string()))?
            }
            None => KubeConfig::infer()
                .await
                .map_err(|e| to_error(e.to_string()))?,
        };

        let client = Client::try_from(config).map_err(|e| to_error(e.to_string()))?;
        Ok(Self::new(client, settings))
    }

    fn labels(spec: &WorkloadSpec) -> BTreeMap<String, String> {
        let mut labels = spec.labels.clone();
        labels.insert("app.kubernetes.io/app".to_string(), spec.name.to_string());
        labels.insert(
            "app.production.instance/name".to_string(),
            spec.name.to_string(),
        );
        labels
    }

    /// Pods are selected by the stable name labels only, so updates never orphan them.
    fn selector(name: &DeploymentName) -> BTreeMap<String, String> {
        let mut selector = BTreeMap::new();
        selector.insert("app.kubernetes.io/app".to_string(), name.to_string());
        selector.insert("app.production.instance/name".to_string(), name.to_string());
        selector
    }

    fn namespace_object(spec: &WorkloadSpec) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(spec.name.to_string()),
                labels: Some(Self::labels(spec)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn deployment_object(&self, spec: &WorkloadSpec) -> Deployment {
        let labels = Self::labels(spec);
        Deployment {
            metadata: ObjectMeta {
                name: Some(spec.name.to_string()),
                namespace: Some(spec.name.to_string()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(self.settings.replicas),
                selector: LabelSelector {
                    match_labels: Some(Self::selector(&spec.name)),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: spec.name.to_string(),
                            image: Some(spec.image.to_string()),
                            ports: Some(vec![ContainerPort {
                                container_port: i32::from(spec.port.get()),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn service_object(&self, spec: &WorkloadSpec) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(spec.name.to_string()),
                namespace: Some(spec.name.to_string()),
                labels: Some(Self::labels(spec)),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                selector: Some(Self::selector(&spec.name)),
                ports: Some(vec![ServicePort {
                    port: self.settings.service_port,
                    target_port: Some(IntOrString::Int(i32::from(spec.port.get()))),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Server-side apply namespace, Deployment, and Service. Creating and
    /// updating are the same request, which makes retries idempotent.
    async fn apply(&self, spec: &WorkloadSpec) -> Result<(), PlatformError> {
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let name = spec.name.as_str();

        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces
            .patch(name, &params, &Patch::Apply(&Self::namespace_object(spec)))
            .await
            .map_err(map_kube_error)?;
        tracing::debug!(namespace = name, "namespace applied");

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), name);
        deployments
            .patch(name, &params, &Patch::Apply(&self.deployment_object(spec)))
            .await
            .map_err(map_kube_error)?;
        tracing::debug!(namespace = name, image = %spec.image, "deployment applied");

        let services: Api<Service> = Api::namespaced(self.client.clone(), name);
        services
            .patch(name, &params, &Patch::Apply(&self.service_object(spec)))
            .await
            .map_err(map_kube_error)?;
        tracing::debug!(namespace = name, "service applied");

        Ok(())
    }

    async fn namespace_ownership(&self, name: &str) -> Result<Ownership, PlatformError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let namespace = namespaces.get_opt(name).await.map_err(map_kube_error)?;
        Ok(ownership(namespace.as_ref()))
    }

    fn refuse_foreign(name: &str) -> PlatformError {
        PlatformError::Rejected(format!(
            "namespace {} exists and is not managed by productionapp",
            name
        ))
    }

    /// Wait for the rollout, then for the load balancer address, within one timeout.
    async fn wait_until_serving(&self, name: &str) -> Result<Endpoint, PlatformError> {
        let deadline = Instant::now() + self.settings.url_timeout;
        self.wait_for_rollout(name, deadline).await?;
        self.wait_for_endpoint(name, deadline).await
    }

    async fn wait_for_rollout(&self, name: &str, deadline: Instant) -> Result<(), PlatformError> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), name);

        loop {
            let deployment = deployments.get(name).await.map_err(map_kube_error)?;
            if rollout_complete(&deployment) {
                tracing::debug!(namespace = name, "rollout complete");
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(PlatformError::Timeout(format!("rollout of {}", name)));
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// Poll the Service until the load balancer reports an address.
    async fn wait_for_endpoint(&self, name: &str, deadline: Instant) -> Result<Endpoint, PlatformError> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), name);

        loop {
            let service = services.get(name).await.map_err(map_kube_error)?;
            let ingress = service
                .status
                .and_then(|s| s.load_balancer)
                .and_then(|lb| lb.ingress)
                .and_then(|ingress| ingress.into_iter().next());

            if let Some(ingress) = ingress
                && let Some(host) = ingress.ip.or(ingress.hostname)
            {
                let port = u16::try_from(self.settings.service_port).ok();
                return Ok(Endpoint::new(host, port));
            }

            if Instant::now() >= deadline {
                return Err(PlatformError::Timeout(format!(
                    "load balancer address of {}",
                    name
                )));
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    async fn summary(&self, namespace: &Namespace) -> Result<Option<WorkloadSummary>, PlatformError> {
        let Some(name) = namespace.metadata.name.clone() else {
            return Ok(None);
        };
        if ownership(Some(namespace)) != Ownership::Managed {
            return Ok(None);
        }
        let labels = namespace.metadata.labels.clone().unwrap_or_default();

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &name);
        let deployment = deployments.get_opt(&name).await.map_err(map_kube_error)?;

        let image = deployment
            .as_ref()
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|p| p.containers.first())
            .and_then(|c| c.image.clone())
            .unwrap_or_default();
        let running = deployment
            .as_ref()
            .and_then(|d| d.status.as_ref())
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0)
            > 0;

        Ok(Some(WorkloadSummary {
            id: WorkloadId::new(name.clone()),
            name: labels.get(LABEL_NAME).cloned().unwrap_or(name),
            image,
            running,
        }))
    }
}

impl Sealed for KubePlatform {}

#[async_trait]
impl Platform for KubePlatform {
    fn kind(&self) -> &'static str {
        "kubernetes"
    }

    async fn find_workload(
        &self,
        name: &DeploymentName,
    ) -> Result<Option<WorkloadSummary>, PlatformError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        match namespaces.get_opt(name.as_str()).await.map_err(map_kube_error)? {
            Some(namespace) => self.summary(&namespace).await,
            None => Ok(None),
        }
    }

    async fn create_workload(
        &self,
        spec: &WorkloadSpec,
    ) -> Result<ProvisionedWorkload, PlatformError> {
        let id = WorkloadId::new(spec.name.to_string());

        let created = match self.namespace_ownership(spec.name.as_str()).await? {
            Ownership::Foreign => return Err(Self::refuse_foreign(spec.name.as_str())),
            Ownership::Managed => false,
            Ownership::Absent => true,
        };

        let result = match self.apply(spec).await {
            Ok(()) => self.wait_until_serving(spec.name.as_str()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(endpoint) => Ok(ProvisionedWorkload { id, endpoint }),
            // A namespace that was already ours stays for the next attempt to adopt.
            Err(e) if !created => Err(e),
            Err(e) => {
                tracing::warn!(name = %spec.name, error = %e, "create failed, deleting namespace");
                if let Err(cleanup) = self.delete_workload(&id).await {
                    tracing::warn!(name = %spec.name, error = %cleanup, "namespace cleanup failed");
                }
                Err(e)
            }
        }
    }

    async fn update_workload(
        &self,
        id: &WorkloadId,
        spec: &WorkloadSpec,
    ) -> Result<ProvisionedWorkload, PlatformError> {
        if id.as_str() != spec.name.as_str() {
            return Err(PlatformError::Rejected(format!(
                "workload {} does not belong to {}",
                id, spec.name
            )));
        }

        match self.namespace_ownership(id.as_str()).await? {
            Ownership::Absent => return Err(PlatformError::NotFound(id.to_string())),
            Ownership::Foreign => return Err(Self::refuse_foreign(id.as_str())),
            Ownership::Managed => {}
        }

        // The Deployment rolls pods in place; old pods serve until new ones are ready.
        self.apply(spec).await?;
        let endpoint = self.wait_until_serving(spec.name.as_str()).await?;
        Ok(ProvisionedWorkload {
            id: id.clone(),
            endpoint,
        })
    }

    async fn delete_workload(&self, id: &WorkloadId) -> Result<(), PlatformError> {
        match self.namespace_ownership(id.as_str()).await? {
            Ownership::Absent => return Err(PlatformError::NotFound(id.to_string())),
            Ownership::Foreign => return Err(Self::refuse_foreign(id.as_str())),
            Ownership::Managed => {}
        }

        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        // Deleting the namespace cascades to the Deployment and Service.
        namespaces
            .delete(id.as_str(), &DeleteParams::default())
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }

    async fn list_workloads(&self) -> Result<Vec<WorkloadSummary>, PlatformError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let params = ListParams::default().labels(&format!("{}=true", LABEL_MANAGED));
        let list = namespaces.list(&params).await.map_err(map_kube_error)?;

        let mut workloads = Vec::new();
        for namespace in &list.items {
            if let Some(summary) = self.summary(namespace).await? {
                workloads.push(summary);
            }
        }
        Ok(workloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageRef, Port};
    use k8s_openapi::api::apps::v1::DeploymentStatus;

    fn spec() -> WorkloadSpec {
        WorkloadSpec::new(
            DeploymentName::new("example").unwrap(),
            ImageRef::parse("gcr.io/kuar-demo/kuard-amd64:blue").unwrap(),
            Port::new(8080).unwrap(),
        )
    }

    #[test]
    fn labels_include_instance_and_management_keys() {
        let labels = KubePlatform::labels(&spec());
        assert_eq!(labels["app.kubernetes.io/app"], "example");
        assert_eq!(labels["app.production.instance/name"], "example");
        assert_eq!(labels[LABEL_MANAGED], "true");
    }

    #[test]
    fn namespace_is_named_after_deployment() {
        let namespace = KubePlatform::namespace_object(&spec());
        assert_eq!(namespace.metadata.name.as_deref(), Some("example"));
    }

    fn namespace_with(labels: &[(&str, &str)]) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some("default".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn unlabeled_namespace_is_foreign() {
        assert_eq!(ownership(None), Ownership::Absent);
        assert_eq!(ownership(Some(&namespace_with(&[]))), Ownership::Foreign);
        assert_eq!(
            ownership(Some(&namespace_with(&[(LABEL_MANAGED, "false")]))),
            Ownership::Foreign
        );
        assert_eq!(
            ownership(Some(&namespace_with(&[(LABEL_MANAGED, "true")]))),
            Ownership::Managed
        );
        assert_eq!(
            ownership(Some(&KubePlatform::namespace_object(&spec()))),
            Ownership::Managed
        );
    }

    fn deployment_status(
        generation: i64,
        observed: i64,
        replicas: i32,
        updated: i32,
        available: i32,
    ) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                generation: Some(generation),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(3),
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                observed_generation: Some(observed),
                replicas: Some(replicas),
                updated_replicas: Some(updated),
                available_replicas: Some(available),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn rollout_waits_for_every_replica_on_the_new_spec() {
        assert!(rollout_complete(&deployment_status(2, 2, 3, 3, 3)));

        // Controller has not seen the new spec yet
        assert!(!rollout_complete(&deployment_status(2, 1, 3, 3, 3)));
        // Old pods still running alongside new ones
        assert!(!rollout_complete(&deployment_status(2, 2, 4, 3, 3)));
        assert!(!rollout_complete(&deployment_status(2, 2, 3, 1, 3)));
        // New pods crash-looping
        assert!(!rollout_complete(&deployment_status(2, 2, 3, 3, 0)));

        let no_status = Deployment {
            status: None,
            ..deployment_status(1, 1, 3, 3, 3)
        };
        assert!(!rollout_complete(&no_status));
    }

    #[test]
    fn selector_is_stable_across_images() {
        let name = DeploymentName::new("example").unwrap();
        let selector = KubePlatform::selector(&name);
        assert_eq!(selector.len(), 2);
        assert!(!selector.contains_key(LABEL_MANAGED));
    }
}
