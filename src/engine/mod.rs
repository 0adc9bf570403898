// ABOUTME: Orchestration around the Deployment resource.
// ABOUTME: Lock the name, load the previous state, provision or tear down, persist the outcome.

mod error;
mod lock;
mod name_locks;

pub use error::{EngineError, LockError};
pub use lock::{DeployLock, LockInfo};
pub use name_locks::NameLocks;

use crate::diagnostics::{Diagnostics, Warning, WarningKind};
use crate::platform::{Platform, WorkloadSummary};
use crate::resource::{Action, DeploymentArgs, DeploymentResource, DeploymentSpec, DeploymentState, plan};
use crate::store::StateStore;
use crate::types::DeploymentName;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// What an operation did to one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub name: DeploymentName,
    pub action: Action,
    /// State after the operation; `None` once torn down.
    pub state: Option<DeploymentState>,
}

/// Stored state next to what the platform currently reports.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub name: DeploymentName,
    pub state: Option<DeploymentState>,
    pub workload: Option<WorkloadSummary>,
}

/// Result of reconciling a declared set.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub outcomes: Vec<Outcome>,
    pub failures: Vec<(DeploymentName, EngineError)>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Both locks for one name, held for the duration of an operation.
struct Held {
    _guard: OwnedMutexGuard<()>,
    file: Option<DeployLock>,
}

/// Runs deployment operations with per-name serialization and persisted state.
///
/// Operations on the same name are serialized in-process by [`NameLocks`] and,
/// when a lock directory is set, across processes by [`DeployLock`]. State is
/// saved only after the platform call succeeded.
pub struct Engine {
    resource: DeploymentResource,
    store: Arc<dyn StateStore>,
    locks: NameLocks,
    lock_dir: Option<PathBuf>,
    force: bool,
}

impl Engine {
    pub fn new(platform: Arc<dyn Platform>, store: Arc<dyn StateStore>) -> Self {
        Self {
            resource: DeploymentResource::new(platform),
            store,
            locks: NameLocks::new(),
            lock_dir: None,
            force: false,
        }
    }

    /// Also take a lock file per name in `dir`.
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    /// Break lock files held by others.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn resource(&self) -> &DeploymentResource {
        &self.resource
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    async fn lock(&self, name: &DeploymentName, diag: &mut Diagnostics) -> Result<Held, EngineError> {
        let guard = self.locks.lock(name).await;

        let file = match self.lock_dir {
            Some(ref dir) => {
                let lock = DeployLock::acquire(dir, name, self.force).await?;
                if let Some(broken) = lock.broken() {
                    diag.warn(Warning::new(
                        WarningKind::LockBroken,
                        name,
                        format!(
                            "broke lock held by {} (pid {}) since {}",
                            broken.holder, broken.pid, broken.started_at
                        ),
                    ));
                }
                Some(lock)
            }
            None => None,
        };

        Ok(Held {
            _guard: guard,
            file,
        })
    }

    async fn unlock(&self, held: Held, diag: &mut Diagnostics) {
        if let Some(file) = held.file {
            let name = file.name().clone();
            if let Err(e) = file.release().await {
                diag.warn(Warning::new(
                    WarningKind::LockRelease,
                    &name,
                    format!("failed to release lock: {}", e),
                ));
            }
        }
    }

    /// Create or update `name` from raw inputs.
    ///
    /// Inputs are validated before any lock is taken or platform call made.
    pub async fn up(
        &self,
        name: &str,
        args: &DeploymentArgs,
        diag: &mut Diagnostics,
    ) -> Result<Outcome, EngineError> {
        let spec = DeploymentSpec::from_args(name, args)?;
        self.up_spec(&spec, diag).await
    }

    pub async fn up_spec(
        &self,
        spec: &DeploymentSpec,
        diag: &mut Diagnostics,
    ) -> Result<Outcome, EngineError> {
        let held = self.lock(spec.name(), diag).await?;
        let result = self.up_locked(spec).await;
        self.unlock(held, diag).await;
        result
    }

    async fn up_locked(&self, spec: &DeploymentSpec) -> Result<Outcome, EngineError> {
        let previous = self.store.load(spec.name()).await?;
        let action = plan(Some(spec), previous.as_ref());

        let state = self.resource.provision(spec, previous).await?;
        if action != Action::NoOp {
            self.store.save(&state).await?;
        }

        Ok(Outcome {
            name: spec.name().clone(),
            action,
            state: Some(state),
        })
    }

    /// Tear down `name`.
    ///
    /// Without a record, stray workloads carrying the name are still removed;
    /// if there are none this is a no-op.
    pub async fn destroy(&self, name: &str, diag: &mut Diagnostics) -> Result<Outcome, EngineError> {
        let name = DeploymentName::new(name).map_err(crate::resource::ValidationError::from)?;
        let held = self.lock(&name, diag).await?;
        let result = self.destroy_locked(&name, diag).await;
        self.unlock(held, diag).await;
        result
    }

    async fn destroy_locked(
        &self,
        name: &DeploymentName,
        diag: &mut Diagnostics,
    ) -> Result<Outcome, EngineError> {
        let action = match self.store.load(name).await? {
            Some(state) => {
                self.resource.teardown(&state).await?;
                self.store.remove(name).await?;
                Action::Delete
            }
            None => {
                let deleted = self.resource.teardown_name(name).await?;
                if deleted > 0 {
                    diag.warn(Warning::new(
                        WarningKind::OrphansRemoved,
                        name,
                        format!("no state record; removed {} workload(s) carrying this name", deleted),
                    ));
                    Action::Delete
                } else {
                    Action::NoOp
                }
            }
        };

        Ok(Outcome {
            name: name.clone(),
            action,
            state: None,
        })
    }

    /// Reconcile the declared set: provision every entry, tear down stored
    /// deployments that are no longer declared.
    ///
    /// Names are processed concurrently. A failure for one name does not stop
    /// the others. With `dry_run` only the planned actions are reported.
    pub async fn apply(
        &self,
        declared: &[DeploymentSpec],
        dry_run: bool,
        diag: &mut Diagnostics,
    ) -> Result<ApplyReport, EngineError> {
        if dry_run {
            return plan_apply(self.store.as_ref(), declared).await;
        }

        let stored = stored_by_name(self.store.as_ref()).await?;
        let undeclared: Vec<&DeploymentName> = stored
            .keys()
            .filter(|name| !declared.iter().any(|spec| spec.name() == *name))
            .collect();

        let ups = declared.iter().map(|spec| async move {
            let mut local = Diagnostics::default();
            let result = self.up_spec(spec, &mut local).await;
            (spec.name().clone(), result, local)
        });
        let downs = undeclared.iter().map(|name| async move {
            let mut local = Diagnostics::default();
            let result = self.destroy(name.as_str(), &mut local).await;
            ((*name).clone(), result, local)
        });

        let (ups, downs) = futures::future::join(
            futures::future::join_all(ups),
            futures::future::join_all(downs),
        )
        .await;

        let mut report = ApplyReport::default();
        for (name, result, local) in ups.into_iter().chain(downs) {
            diag.merge(local);
            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(%name, "{}", e);
                    report.failures.push((name, e));
                }
            }
        }
        Ok(report)
    }

    /// All stored deployments.
    pub async fn list(&self) -> Result<Vec<DeploymentState>, EngineError> {
        Ok(self.store.list().await?)
    }

    /// Stored state of `name` and the workload the platform reports for it.
    pub async fn status(&self, name: &str) -> Result<Status, EngineError> {
        let name = DeploymentName::new(name).map_err(crate::resource::ValidationError::from)?;
        let state = self.store.load(&name).await?;
        let workload = self.resource.platform().find_workload(&name).await?;
        Ok(Status {
            name,
            state,
            workload,
        })
    }
}

async fn stored_by_name(
    store: &dyn StateStore,
) -> Result<BTreeMap<DeploymentName, DeploymentState>, EngineError> {
    Ok(store
        .list()
        .await?
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect())
}

/// What `apply` would do, computed from recorded state alone.
///
/// Needs no platform connection and takes no locks.
pub async fn plan_apply(
    store: &dyn StateStore,
    declared: &[DeploymentSpec],
) -> Result<ApplyReport, EngineError> {
    let stored = stored_by_name(store).await?;

    let mut outcomes: Vec<Outcome> = declared
        .iter()
        .map(|spec| Outcome {
            name: spec.name().clone(),
            action: plan(Some(spec), stored.get(spec.name())),
            state: stored.get(spec.name()).cloned(),
        })
        .collect();
    outcomes.extend(
        stored
            .iter()
            .filter(|(name, _)| !declared.iter().any(|spec| spec.name() == *name))
            .map(|(name, state)| Outcome {
                name: name.clone(),
                action: Action::Delete,
                state: Some(state.clone()),
            }),
    );

    Ok(ApplyReport {
        outcomes,
        failures: Vec::new(),
    })
}
