// ABOUTME: The Deployment resource: typed inputs and outputs, planning, and provisioning.
// ABOUTME: Everything a host-language binding needs to create, update, or tear down a deployment.

mod deployment;
mod error;
mod plan;
mod schema;
mod spec;
mod state;

pub use deployment::DeploymentResource;
pub use error::{ResourceError, ResourceErrorKind, ValidationError};
pub use plan::{Action, plan};
pub use schema::{PropertySchema, PropertyType, RESOURCE_TOKEN, ResourceSchema, schema};
pub use spec::{AppliedSpec, DeploymentArgs, DeploymentSpec};
pub use state::DeploymentState;
