// ABOUTME: Decides what to do given desired and recorded state.
// ABOUTME: Pure function, no I/O.

use super::spec::DeploymentSpec;
use super::state::DeploymentState;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    NoOp,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::NoOp => "unchanged",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

pub fn plan(desired: Option<&DeploymentSpec>, observed: Option<&DeploymentState>) -> Action {
    match (desired, observed) {
        (None, None) => Action::NoOp,
        (None, Some(_)) => Action::Delete,
        (Some(_), None) => Action::Create,
        (Some(spec), Some(state)) if state.matches(spec) => Action::NoOp,
        (Some(_), Some(_)) => Action::Update,
    }
}
