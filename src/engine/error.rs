// ABOUTME: Errors raised while orchestrating deployments.
// ABOUTME: Wraps resource, store, and lock failures without changing their messages.

use crate::platform::PlatformError;
use crate::resource::{ResourceError, ResourceErrorKind, ValidationError};
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "deployment {name} is locked by {holder} (pid {pid}) since {started_at}; use --force to break the lock"
    )]
    Held {
        name: String,
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("lock for {0} was acquired by another process while breaking it")]
    Contended(String),

    #[error("failed to {action} lock {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode lock info: {0}")]
    Encode(#[source] serde_json::Error),
}

impl LockError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LockError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("failed to query platform: {0}")]
    Platform(#[from] PlatformError),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Resource(err.into())
    }
}

impl EngineError {
    /// Kind of the underlying resource error, if that is what failed.
    pub fn resource_kind(&self) -> Option<ResourceErrorKind> {
        match self {
            EngineError::Resource(e) => Some(e.kind()),
            _ => None,
        }
    }
}
