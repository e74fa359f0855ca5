//! Component and dependency lifecycle states

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    /// Declared but not enabled; dependencies are not tracked
    Inactive,
    /// Enabled and tracking dependencies, waiting for required ones
    Waiting,
    /// All required dependencies satisfied; `init`/`start` have run
    Active,
    /// Terminal; `destroy` has run and the gate is closed
    Destroyed,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ComponentState::Inactive => "inactive",
            ComponentState::Waiting => "waiting",
            ComponentState::Active => "active",
            ComponentState::Destroyed => "destroyed",
        };
        f.write_str(text)
    }
}

/// Resolution state of a single dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyState {
    /// The filter template references context keys that no source provides
    UnresolvedContext,
    /// The filter text does not parse; the dependency can never match
    InvalidFilter,
    /// Resolvable but the selected set is empty and a provider is required
    Unsatisfied,
    /// The cardinality's requirements are met
    Satisfied,
}

impl DependencyState {
    /// Whether this state counts as satisfied for component aggregation
    pub fn is_satisfied(self) -> bool {
        matches!(self, DependencyState::Satisfied)
    }
}

impl fmt::Display for DependencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DependencyState::UnresolvedContext => "unresolved-context",
            DependencyState::InvalidFilter => "invalid-filter",
            DependencyState::Unsatisfied => "unsatisfied",
            DependencyState::Satisfied => "satisfied",
        };
        f.write_str(text)
    }
}
