// ABOUTME: Platform connection errors with the SNAFU pattern.
// ABOUTME: Unifies detection and client construction failures for programmatic handling.

use snafu::Snafu;

use super::detection::DetectionError;

/// Failure to reach a platform before any workload operation runs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectError {
    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("container runtime connection failed: {message}"))]
    Docker { message: String },

    #[snafu(display("kubernetes connection failed: {message}"))]
    Kubernetes { message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    /// No container runtime socket found on this machine.
    NoRuntimeFound,
    /// A configured socket path does not exist.
    SocketMissing,
    /// The client could not be built or the API did not answer.
    ConnectionFailed,
}

impl ConnectError {
    pub fn kind(&self) -> ConnectErrorKind {
        match self {
            ConnectError::Detection { source } => match source {
                DetectionError::NoRuntimeFound => ConnectErrorKind::NoRuntimeFound,
                DetectionError::SocketMissing(_) => ConnectErrorKind::SocketMissing,
            },
            ConnectError::Docker { .. } | ConnectError::Kubernetes { .. } => {
                ConnectErrorKind::ConnectionFailed
            }
        }
    }
}

impl From<DetectionError> for ConnectError {
    fn from(source: DetectionError) -> Self {
        ConnectError::Detection { source }
    }
}
