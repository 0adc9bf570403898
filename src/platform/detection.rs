// ABOUTME: Local container runtime detection for the Docker/Podman backend.
// ABOUTME: Checks Podman sockets first, then Docker, unless a socket is configured.

use serde::{Deserialize, Serialize};
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// The container runtime behind the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "docker"),
            RuntimeType::Podman => write!(f, "podman"),
        }
    }
}

/// Detected runtime information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub runtime_type: RuntimeType,
    pub socket_path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("configured socket does not exist: {0}")]
    SocketMissing(String),
}

/// Sockets tried when none is configured, most specific first.
fn candidate_sockets(uid: Option<&str>) -> Vec<(RuntimeType, String)> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(uid) = uid {
        candidates.push((
            RuntimeType::Podman,
            format!("/run/user/{uid}/podman/podman.sock"),
        ));
    }
    candidates.push((RuntimeType::Podman, ROOTFUL_PODMAN.to_string()));
    candidates.push((RuntimeType::Docker, DOCKER_SOCKET.to_string()));
    candidates
}

/// Find the Docker-compatible socket to talk to.
///
/// A configured `socket` must exist; its runtime is inferred from the path.
/// Otherwise rootless Podman, rootful Podman and Docker are tried in turn.
pub fn detect_local(socket: Option<&str>) -> Result<RuntimeInfo, DetectionError> {
    if let Some(socket) = socket {
        return match Path::new(socket).exists() {
            true => Ok(RuntimeInfo {
                runtime_type: runtime_for_socket(socket),
                socket_path: socket.to_string(),
            }),
            false => Err(DetectionError::SocketMissing(socket.to_string())),
        };
    }

    candidate_sockets(current_uid().as_deref())
        .into_iter()
        .find(|(_, path)| Path::new(path).exists())
        .map(|(runtime_type, socket_path)| {
            tracing::debug!(runtime = %runtime_type, socket = %socket_path, "detected container runtime");
            RuntimeInfo {
                runtime_type,
                socket_path,
            }
        })
        .ok_or(DetectionError::NoRuntimeFound)
}

fn runtime_for_socket(socket: &str) -> RuntimeType {
    match socket.contains("podman") {
        true => RuntimeType::Podman,
        false => RuntimeType::Docker,
    }
}

/// `$UID` if exported, else the real uid from `/proc/self/status`.
fn current_uid() -> Option<String> {
    if let Ok(uid) = std::env::var("UID") {
        return Some(uid);
    }
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("Uid:"))?;
    line.split_whitespace().nth(1).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_decides_runtime_type() {
        assert_eq!(
            runtime_for_socket("/run/user/1000/podman/podman.sock"),
            RuntimeType::Podman
        );
        assert_eq!(runtime_for_socket("/var/run/docker.sock"), RuntimeType::Docker);
    }

    #[test]
    fn rootless_podman_is_tried_first() {
        let candidates = candidate_sockets(Some("1000"));
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].1, "/run/user/1000/podman/podman.sock");
        assert_eq!(candidates[2], (RuntimeType::Docker, DOCKER_SOCKET.to_string()));

        assert_eq!(candidate_sockets(None).len(), 2);
    }

    #[test]
    fn missing_configured_socket_is_an_error() {
        let err = detect_local(Some("/nonexistent/productionapp.sock")).unwrap_err();
        assert!(matches!(err, DetectionError::SocketMissing(_)));
    }
}
