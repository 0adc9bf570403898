// ABOUTME: Validated domain types shared by the resource, platforms, and store.
// ABOUTME: Names, image references, ports, and platform workload identifiers.

mod deployment_name;
mod image_ref;
mod port;
mod workload_id;

pub use deployment_name::{DeploymentName, DeploymentNameError};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use port::{Port, PortError};
pub use workload_id::WorkloadId;
