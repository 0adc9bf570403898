// ABOUTME: Deploy lock to prevent concurrent operations on the same deployment across processes.
// ABOUTME: Uses atomic file creation with lock info stored next to the state records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::LockError;
use crate::types::DeploymentName;

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Deployment being changed.
    pub name: String,
    /// Random per-acquisition value, so two acquisitions by the same process never look alike.
    #[serde(default)]
    pub token: u64,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(name: &DeploymentName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            name: name.to_string(),
            token: rand::random(),
        }
    }

    /// True if `other` was written by the same acquisition as `self`.
    pub fn same_acquisition(&self, other: &LockInfo) -> bool {
        self.holder == other.holder
            && self.pid == other.pid
            && self.started_at == other.started_at
            && self.token == other.token
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Path to the lock file for a deployment.
    pub fn lock_path(dir: &Path, name: &DeploymentName) -> PathBuf {
        dir.join(format!("{}.lock", name))
    }
}

/// A held deploy lock.
///
/// Call [`DeployLock::release`] when done. A lock dropped without release
/// (for example by a cancelled task) removes its file synchronously.
///
/// Either way the file is only removed while it still holds this lock's
/// [`LockInfo`]; once someone has broken the lock the file is theirs.
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
    name: DeploymentName,
    info: LockInfo,
    broken: Option<LockInfo>,
    released: bool,
}

impl DeployLock {
    /// Acquire the deploy lock for `name` in `dir`.
    ///
    /// Uses `create_new` for atomic acquisition (no TOCTOU race).
    /// Returns an error if the lock is held by another process.
    /// Stale locks (>1 hour) and, with `force`, live ones are broken.
    pub async fn acquire(
        dir: &Path,
        name: &DeploymentName,
        force: bool,
    ) -> Result<Self, LockError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| LockError::io("create", dir, e))?;

        let path = LockInfo::lock_path(dir, name);
        let info = LockInfo::new(name);
        let json = serde_json::to_string(&info).map_err(LockError::Encode)?;

        if Self::try_create(&path, &json).await? {
            return Ok(Self::held(path, name, info, None));
        }

        // Lock exists - check whether it should be broken
        let existing = Self::read_existing(&path).await;
        match existing {
            Some(ref existing) if !force && !existing.is_stale() => {
                return Err(LockError::Held {
                    name: name.to_string(),
                    holder: existing.holder.clone(),
                    pid: existing.pid,
                    started_at: existing.started_at,
                });
            }
            Some(ref existing) if force => {
                tracing::warn!(
                    "Breaking lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
            }
            Some(ref existing) => {
                tracing::warn!(
                    "Auto-breaking stale lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
            }
            None => tracing::warn!("Lock info unreadable, breaking lock"),
        }

        tracing::debug!("Removing stale/forced lock at {}", path.display());
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(LockError::io("remove", &path, e)),
        }

        if !Self::try_create(&path, &json).await? {
            return Err(LockError::Contended(name.to_string()));
        }

        let broken = existing.or_else(|| {
            Some(LockInfo {
                holder: "unknown".to_string(),
                pid: 0,
                started_at: Utc::now(),
                name: name.to_string(),
                token: 0,
            })
        });
        Ok(Self::held(path, name, info, broken))
    }

    fn held(
        path: PathBuf,
        name: &DeploymentName,
        info: LockInfo,
        broken: Option<LockInfo>,
    ) -> Self {
        Self {
            path,
            name: name.clone(),
            info,
            broken,
            released: false,
        }
    }

    /// Returns false if the file already exists.
    async fn try_create(path: &Path, contents: &str) -> Result<bool, LockError> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await;

        let mut file = match file {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(LockError::io("create", path, e)),
        };

        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| LockError::io("write", path, e))?;
        file.flush()
            .await
            .map_err(|e| LockError::io("write", path, e))?;
        Ok(true)
    }

    async fn read_existing(path: &Path) -> Option<LockInfo> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn name(&self) -> &DeploymentName {
        &self.name
    }

    /// The lock that had to be broken to acquire this one, if any.
    pub fn broken(&self) -> Option<&LockInfo> {
        self.broken.as_ref()
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    fn still_ours(&self, content: &str) -> bool {
        serde_json::from_str::<LockInfo>(content).is_ok_and(|on_disk| on_disk.same_acquisition(&self.info))
    }

    /// Release the lock. A lock that was broken in the meantime is left alone.
    pub async fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(LockError::io("read", &self.path, e)),
        };
        if !self.still_ours(&content) {
            tracing::warn!(name = %self.name, "lock was taken over by another holder, leaving it");
            return Ok(());
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::io("remove", &self.path, e)),
        }
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Ok(content) = std::fs::read_to_string(&self.path)
            && self.still_ours(&content)
        {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DeploymentName {
        DeploymentName::new(s).unwrap()
    }

    #[test]
    fn lock_info_creates_with_current_host_and_pid() {
        let info = LockInfo::new(&name("test-service"));

        assert_eq!(info.name, "test-service");
        assert_eq!(info.pid, std::process::id());
        assert!(!info.holder.is_empty());
    }

    #[test]
    fn lock_path_uses_state_dir() {
        assert_eq!(
            LockInfo::lock_path(Path::new("/state"), &name("myapp")),
            PathBuf::from("/state/myapp.lock")
        );
    }

    #[test]
    fn fresh_lock_is_not_stale() {
        assert!(!LockInfo::new(&name("test")).is_stale());
    }

    #[test]
    fn old_lock_is_stale() {
        let mut info = LockInfo::new(&name("test"));
        info.started_at = Utc::now() - chrono::Duration::hours(2);
        assert!(info.is_stale());
    }

    #[tokio::test]
    async fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock = DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap();
        assert!(lock.broken().is_none());

        let err = DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Held { .. }));

        lock.release().await.unwrap();
        assert!(!dir.path().join("web.lock").exists());
        DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn force_breaks_live_lock() {
        let dir = tempfile::tempdir().unwrap();
        let _held = DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap();

        let forced = DeployLock::acquire(dir.path(), &name("web"), true)
            .await
            .unwrap();
        assert_eq!(forced.broken().unwrap().pid, std::process::id());
    }

    #[tokio::test]
    async fn stale_and_corrupt_locks_are_broken() {
        let dir = tempfile::tempdir().unwrap();
        let mut stale = LockInfo::new(&name("web"));
        stale.started_at = Utc::now() - chrono::Duration::hours(3);
        stale.holder = "elsewhere".to_string();
        std::fs::write(
            dir.path().join("web.lock"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("api.lock"), "garbage").unwrap();

        let web = DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap();
        assert_eq!(web.broken().unwrap().holder, "elsewhere");

        let api = DeployLock::acquire(dir.path(), &name("api"), false)
            .await
            .unwrap();
        assert_eq!(api.broken().unwrap().holder, "unknown");
    }

    #[tokio::test]
    async fn broken_holder_does_not_release_new_holders_lock() {
        let dir = tempfile::tempdir().unwrap();
        let first = DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap();
        let second = DeployLock::acquire(dir.path(), &name("web"), true)
            .await
            .unwrap();
        assert!(second.broken().unwrap().same_acquisition(first.info()));

        first.release().await.unwrap();
        assert!(dir.path().join("web.lock").exists());
        let err = DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Held { .. }));

        second.release().await.unwrap();
        assert!(!dir.path().join("web.lock").exists());
    }

    #[tokio::test]
    async fn broken_holder_drop_leaves_new_holders_lock() {
        let dir = tempfile::tempdir().unwrap();
        let first = DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap();
        let _second = DeployLock::acquire(dir.path(), &name("web"), true)
            .await
            .unwrap();

        drop(first);
        assert!(dir.path().join("web.lock").exists());
    }

    #[tokio::test]
    async fn dropped_lock_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock = DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap();
        drop(lock);
        assert!(!dir.path().join("web.lock").exists());
    }
}
