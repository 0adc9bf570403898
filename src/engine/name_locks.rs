// ABOUTME: In-process mutual exclusion per deployment name.
// ABOUTME: Same-name operations queue up; different names never contend.

use crate::types::DeploymentName;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Async mutex per name. Guards are owned so they can cross `.await` and tasks.
#[derive(Debug, Clone, Default)]
pub struct NameLocks {
    inner: Arc<Mutex<HashMap<DeploymentName, Arc<tokio::sync::Mutex<()>>>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `name` is free and take it.
    pub async fn lock(&self, name: &DeploymentName) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock();
            // Entries nobody holds or waits on can go.
            map.retain(|_, m| Arc::strong_count(m) > 1);
            map.entry(name.clone()).or_default().clone()
        };
        mutex.lock_owned().await
    }

    /// Take `name` only if it is free right now.
    pub fn try_lock(&self, name: &DeploymentName) -> Option<OwnedMutexGuard<()>> {
        let mutex = self.inner.lock().entry(name.clone()).or_default().clone();
        mutex.try_lock_owned().ok()
    }
}
