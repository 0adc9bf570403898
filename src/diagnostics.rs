// ABOUTME: Non-fatal warnings collected while an engine operation runs.
// ABOUTME: Each warning names the deployment it concerns; the CLI prints them after the result.

use crate::types::DeploymentName;
use std::fmt;

/// Categories of warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// The lock file could not be removed and may block the next run.
    LockRelease,
    /// A stale or forced lock held by someone else was taken over.
    LockBroken,
    /// Workloads with no state record were deleted.
    OrphansRemoved,
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub name: DeploymentName,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, name: &DeploymentName, message: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Accumulates warnings for one command.
///
/// Concurrent tasks each get their own `Diagnostics` and the caller merges
/// them afterwards, so no locking is needed here.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning; it is also emitted as a tracing event.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(name = %warning.name, kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Append the warnings of `other` without logging them a second time.
    pub fn merge(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn for_name<'a>(&'a self, name: &'a DeploymentName) -> impl Iterator<Item = &'a Warning> {
        self.warnings.iter().filter(move |w| &w.name == name)
    }
}
