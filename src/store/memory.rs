// ABOUTME: In-memory state store.
// ABOUTME: Shared across clones; used by tests and the memory platform.

use super::{StateStore, StoreError};
use crate::resource::DeploymentState;
use crate::types::DeploymentName;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    records: Arc<RwLock<BTreeMap<DeploymentName, DeploymentState>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, name: &DeploymentName) -> Result<Option<DeploymentState>, StoreError> {
        Ok(self.records.read().await.get(name).cloned())
    }

    async fn save(&self, state: &DeploymentState) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(state.name.clone(), state.clone());
        Ok(())
    }

    async fn remove(&self, name: &DeploymentName) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(name).is_some())
    }

    async fn list(&self) -> Result<Vec<DeploymentState>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
