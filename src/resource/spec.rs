// ABOUTME: Deployment inputs, raw and validated.
// ABOUTME: DeploymentSpec can only be built from inputs that passed validation.

use super::error::ValidationError;
use crate::platform::WorkloadSpec;
use crate::types::{DeploymentName, ImageRef, Port};
use serde::{Deserialize, Serialize};

/// Inputs exactly as a caller supplied them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentArgs {
    pub image: String,
    pub port: i64,
}

impl DeploymentArgs {
    pub fn new(image: impl Into<String>, port: i64) -> Self {
        Self {
            image: image.into(),
            port,
        }
    }
}

/// The image and port a deployment was last provisioned with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSpec {
    pub image: ImageRef,
    pub port: Port,
}

/// Validated desired state of one named deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSpec {
    name: DeploymentName,
    image: ImageRef,
    port: Port,
}

impl DeploymentSpec {
    pub fn new(name: DeploymentName, image: ImageRef, port: Port) -> Self {
        Self { name, image, port }
    }

    /// Validate raw inputs for `name`.
    pub fn from_args(name: &str, args: &DeploymentArgs) -> Result<Self, ValidationError> {
        let name = DeploymentName::new(name)?;
        let image = ImageRef::parse(&args.image)?;
        let port = Port::new(args.port)?;
        Ok(Self::new(name, image, port))
    }

    pub fn name(&self) -> &DeploymentName {
        &self.name
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn applied(&self) -> AppliedSpec {
        AppliedSpec {
            image: self.image.clone(),
            port: self.port,
        }
    }

    pub fn to_workload(&self) -> WorkloadSpec {
        WorkloadSpec::new(self.name.clone(), self.image.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortError;

    #[test]
    fn from_args_accepts_valid_input() {
        let spec = DeploymentSpec::from_args("kuard", &DeploymentArgs::new("nginx", 80)).unwrap();
        assert_eq!(spec.name().as_str(), "kuard");
        assert_eq!(spec.image().to_string(), "nginx:latest");
        assert_eq!(spec.port().get(), 80);
    }

    #[test]
    fn from_args_rejects_out_of_range_ports() {
        for port in [0, -1, 65536, 70000] {
            let err = DeploymentSpec::from_args("kuard", &DeploymentArgs::new("nginx", port))
                .unwrap_err();
            assert_eq!(err, ValidationError::Port(PortError::OutOfRange(port)));
        }
    }

    #[test]
    fn from_args_rejects_bad_name_and_image() {
        let err = DeploymentSpec::from_args("Bad_Name", &DeploymentArgs::new("nginx", 80));
        assert!(matches!(err, Err(ValidationError::Name(_))));

        let err = DeploymentSpec::from_args("kuard", &DeploymentArgs::new("", 80));
        assert!(matches!(err, Err(ValidationError::Image(_))));
    }

    #[test]
    fn workload_spec_mirrors_inputs() {
        let spec = DeploymentSpec::from_args("kuard", &DeploymentArgs::new("nginx:1.25", 8080))
            .unwrap();
        let workload = spec.to_workload();
        assert_eq!(&workload.name, spec.name());
        assert_eq!(&workload.image, spec.image());
        assert_eq!(workload.port, spec.port());
    }
}
