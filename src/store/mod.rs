// ABOUTME: Persistence of the last successful DeploymentState per name.
// ABOUTME: File-backed JSON records for real use, an in-memory map for tests.

mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use crate::resource::DeploymentState;
use crate::types::DeploymentName;
use async_trait::async_trait;

/// Where previous states live between runs.
///
/// `save` replaces the record for a name as a whole; readers never observe a
/// partially written record.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, name: &DeploymentName) -> Result<Option<DeploymentState>, StoreError>;

    async fn save(&self, state: &DeploymentState) -> Result<(), StoreError>;

    /// Returns whether a record existed.
    async fn remove(&self, name: &DeploymentName) -> Result<bool, StoreError>;

    /// All records, ordered by name.
    async fn list(&self) -> Result<Vec<DeploymentState>, StoreError>;
}
