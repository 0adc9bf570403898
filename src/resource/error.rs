// ABOUTME: Error taxonomy of the Deployment resource.
// ABOUTME: Validation (caller-fixable), provision and teardown (platform failures, retryable).

use crate::platform::PlatformError;
use crate::types::{DeploymentNameError, ParseImageRefError, PortError};

/// Malformed input. Raised before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid name: {0}")]
    Name(#[from] DeploymentNameError),

    #[error("invalid image: {0}")]
    Image(#[from] ParseImageRefError),

    #[error("invalid port: {0}")]
    Port(#[from] PortError),

    #[error("missing required property: {0}")]
    MissingProperty(&'static str),

    #[error("property {property} must be {expected}")]
    WrongType {
        property: &'static str,
        expected: &'static str,
    },

    #[error("unknown property: {0}")]
    UnknownProperty(String),

    #[error("recorded state belongs to {recorded}, not {requested}")]
    NameMismatch { recorded: String, requested: String },
}

/// Errors surfaced by [`super::DeploymentResource`]. None are retried internally.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The platform rejected creation or update; the previous state still holds.
    #[error("provisioning {name} failed: {source}")]
    Provision {
        name: String,
        #[source]
        source: PlatformError,
    },

    /// Deletion failed; the workload may still be running.
    #[error("teardown of {name} failed: {source}")]
    Teardown {
        name: String,
        #[source]
        source: PlatformError,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceErrorKind {
    Validation,
    Provision,
    Teardown,
}

impl ResourceError {
    pub fn kind(&self) -> ResourceErrorKind {
        match self {
            ResourceError::Validation(_) => ResourceErrorKind::Validation,
            ResourceError::Provision { .. } => ResourceErrorKind::Provision,
            ResourceError::Teardown { .. } => ResourceErrorKind::Teardown,
        }
    }

    /// Whether re-issuing the same call may succeed without changing the input.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ResourceError::Validation(_))
    }

    pub fn platform_error(&self) -> Option<&PlatformError> {
        match self {
            ResourceError::Validation(_) => None,
            ResourceError::Provision { source, .. } | ResourceError::Teardown { source, .. } => {
                Some(source)
            }
        }
    }
}
