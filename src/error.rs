// ABOUTME: Application-wide error types for productionapp.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::engine::EngineError;
use crate::platform::ConnectError;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to connect to platform: {0}")]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("state store: {0}")]
    Store(#[from] StoreError),

    #[error("{0} of {1} deployment(s) failed")]
    ApplyFailed(usize, usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
