// ABOUTME: File-backed state store, one `<name>.json` per deployment.
// ABOUTME: Writes go to a temporary file that is renamed into place.

use super::{StateStore, StoreError};
use crate::resource::DeploymentState;
use crate::types::DeploymentName;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Default state directory relative to the home directory (XDG state dir).
const STATE_DIR: &str = ".local/state/productionapp";

/// Stores each deployment record as `{state_dir}/{name}.json`.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under `~/.local/state/productionapp`.
    pub fn new_default() -> Result<Self, StoreError> {
        Ok(Self::new(Self::default_dir()?))
    }

    pub fn default_dir() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
        Ok(home.join(STATE_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &DeploymentName) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn temp_path(&self, name: &DeploymentName) -> PathBuf {
        self.dir
            .join(format!(".{}.json.{}.tmp", name, std::process::id()))
    }

    async fn read_record(path: &Path) -> Result<Option<DeploymentState>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io("failed to read", path, e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, name: &DeploymentName) -> Result<Option<DeploymentState>, StoreError> {
        Self::read_record(&self.record_path(name)).await
    }

    async fn save(&self, state: &DeploymentState) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io("failed to create", &self.dir, e))?;

        let content = serde_json::to_string_pretty(state).map_err(StoreError::Encode)?;
        let temp = self.temp_path(&state.name);
        let path = self.record_path(&state.name);

        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| StoreError::io("failed to write", &temp, e))?;

        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StoreError::io("failed to replace", &path, e));
        }

        tracing::debug!(name = %state.name, path = %path.display(), "state saved");
        Ok(())
    }

    async fn remove(&self, name: &DeploymentName) -> Result<bool, StoreError> {
        let path = self.record_path(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io("failed to remove", &path, e)),
        }
    }

    async fn list(&self) -> Result<Vec<DeploymentState>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("failed to read", &self.dir, e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("failed to read", &self.dir, e))?
        {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }

            match Self::read_record(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping unreadable state record: {}", e),
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}
