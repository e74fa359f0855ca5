//! Introspection DTOs
//!
//! Read-only snapshots of live engine state, republished at gate boundaries
//! and safe to serialize for shells, consoles, or tests. Reading them never
//! mutates the engine.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::value_objects::{
    BindingPolicy, Cardinality, ComponentState, DependencyState, ProviderHandle,
    ServiceProperties,
};

/// Compact identity of a provider in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSummary {
    /// Capability type
    pub capability: String,
    /// Registration id
    pub registration_id: u64,
    /// Ranking at snapshot time
    pub ranking: i64,
}

impl From<&ProviderHandle> for ProviderSummary {
    fn from(handle: &ProviderHandle) -> Self {
        Self {
            capability: handle.capability().to_string(),
            registration_id: handle.registration_id(),
            ranking: handle.ranking(),
        }
    }
}

/// Snapshot of one dependency's resolution state
#[derive(Debug, Clone, Serialize)]
pub struct DependencyDescription {
    /// Declared name
    pub name: String,
    /// Tracked capability type
    pub capability: String,
    /// Filter template as declared, if any
    pub declared_filter: Option<String>,
    /// Concrete filter after context resolution, if currently resolved
    pub effective_filter: Option<String>,
    /// Declared cardinality
    pub cardinality: Cardinality,
    /// Declared binding policy
    pub policy: BindingPolicy,
    /// Whether the dependency gates component satisfaction
    pub required: bool,
    /// Current resolution state
    pub state: DependencyState,
    /// Candidates accepted by the tracking chain
    pub matching: Vec<ProviderSummary>,
    /// Selection after ranking and cardinality truncation
    pub selected: Vec<ProviderSummary>,
    /// Providers currently bound to the component
    pub bound: Vec<ProviderSummary>,
    /// Last error recorded for this dependency (filter syntax, callback or
    /// interceptor failure), if any
    pub last_error: Option<String>,
}

/// Snapshot of one managed component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentDescription {
    /// Engine-assigned component id
    pub id: String,
    /// Declared name
    pub name: String,
    /// Lifecycle state at snapshot time
    pub state: ComponentState,
    /// Whether an enable request is in effect
    pub enabled: bool,
    /// Declared properties
    pub properties: ServiceProperties,
    /// Per-dependency resolution snapshots, in declaration order
    pub dependencies: Vec<DependencyDescription>,
    /// Last lifecycle callback failure recorded for the component, if any
    pub last_error: Option<String>,
    /// When this snapshot was captured
    pub captured_at: DateTime<Utc>,
}
