// ABOUTME: The platform boundary: whatever actually runs an image on a port.
// ABOUTME: Exposes the Platform trait and the Docker/Podman, Kubernetes, and in-memory backends.

mod connect;
mod detection;
mod docker;
mod error;
mod kubernetes;
mod memory;
pub(crate) mod sealed;
mod traits;

pub use connect::{PlatformConfig, PlatformKind, connect};
pub use detection::{DetectionError, RuntimeInfo, RuntimeType, detect_local};
pub use docker::BollardPlatform;
pub use error::{ConnectError, ConnectErrorKind};
pub use kubernetes::{KubePlatform, KubeSettings};
pub use memory::{MemoryPlatform, MemoryWorkload};
pub use traits::{
    Endpoint, LABEL_MANAGED, LABEL_NAME, Platform, PlatformError, ProvisionedWorkload,
    WorkloadSpec, WorkloadSummary,
};
