// ABOUTME: Platform selection from configuration.
// ABOUTME: Builds the configured backend behind a shared Platform trait object.

use super::detection::detect_local;
use super::docker::BollardPlatform;
use super::error::ConnectError;
use super::kubernetes::{KubePlatform, KubeSettings};
use super::memory::MemoryPlatform;
use super::traits::Platform;
use crate::config::expand_home;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Which backend runs the workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    #[default]
    Docker,
    Kubernetes,
    /// Workloads live only as long as the process; for tests and dry runs.
    Memory,
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformKind::Docker => write!(f, "docker"),
            PlatformKind::Kubernetes => write!(f, "kubernetes"),
            PlatformKind::Memory => write!(f, "memory"),
        }
    }
}

/// The `platform:` section of the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub kind: PlatformKind,

    /// Docker/Podman socket; auto-detected when absent.
    #[serde(default)]
    pub socket: Option<String>,

    /// Host name used in URLs of Docker/Podman deployments.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default, with = "humantime_serde")]
    pub stop_timeout: Option<Duration>,

    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    #[serde(default = "default_replicas")]
    pub replicas: i32,

    #[serde(default = "default_service_port")]
    pub service_port: i32,

    #[serde(default = "default_url_timeout", with = "humantime_serde")]
    pub url_timeout: Duration,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_replicas() -> i32 {
    3
}

fn default_service_port() -> i32 {
    80
}

fn default_url_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            kind: PlatformKind::default(),
            socket: None,
            host: default_host(),
            stop_timeout: None,
            kubeconfig: None,
            replicas: default_replicas(),
            service_port: default_service_port(),
            url_timeout: default_url_timeout(),
        }
    }
}

impl PlatformConfig {
    fn kube_settings(&self) -> KubeSettings {
        KubeSettings {
            replicas: self.replicas,
            service_port: self.service_port,
            url_timeout: self.url_timeout,
            ..KubeSettings::default()
        }
    }
}

/// Connect to the configured platform.
pub async fn connect(config: &PlatformConfig) -> Result<Arc<dyn Platform>, ConnectError> {
    match config.kind {
        PlatformKind::Docker => {
            let info = detect_local(config.socket.as_deref())?;
            tracing::debug!(runtime = %info.runtime_type, socket = %info.socket_path, "using container runtime");
            let mut platform = BollardPlatform::connect(&info, &config.host)?;
            if let Some(timeout) = config.stop_timeout {
                platform = platform.with_stop_timeout(timeout);
            }
            Ok(Arc::new(platform))
        }
        PlatformKind::Kubernetes => {
            let kubeconfig = config.kubeconfig.as_deref().map(expand_home);
            let platform = KubePlatform::connect(kubeconfig.as_deref(), config.kube_settings()).await?;
            Ok(Arc::new(platform))
        }
        PlatformKind::Memory => Ok(Arc::new(MemoryPlatform::new().with_host(config.host.clone()))),
    }
}
