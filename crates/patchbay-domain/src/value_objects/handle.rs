//! Provider handles
//!
//! A [`ProviderHandle`] is the registry-visible identity of one registered
//! capability instance. Handles are immutable: a property update supersedes
//! the handle with a new property view under the same registration id.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::properties::ServiceProperties;

/// Identity and property view of one registered provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHandle {
    capability: String,
    registration_id: u64,
    properties: ServiceProperties,
}

impl ProviderHandle {
    /// Create a handle. Called by the registry when a provider is published.
    pub fn new<S: Into<String>>(
        capability: S,
        registration_id: u64,
        properties: ServiceProperties,
    ) -> Self {
        Self {
            capability: capability.into(),
            registration_id,
            properties,
        }
    }

    /// The capability type this provider offers
    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// The monotonically increasing registration id, unique per registry
    pub fn registration_id(&self) -> u64 {
        self.registration_id
    }

    /// The property dictionary attached at registration or last update
    pub fn properties(&self) -> &ServiceProperties {
        &self.properties
    }

    /// The provider's ranking (higher is preferred)
    pub fn ranking(&self) -> i64 {
        self.properties.ranking()
    }

    /// Whether two handles refer to the same registration
    ///
    /// Superseded handles keep their registration id, so this holds across
    /// property updates while full equality does not.
    pub fn same_registration(&self, other: &ProviderHandle) -> bool {
        self.registration_id == other.registration_id && self.capability == other.capability
    }

    /// Produce the superseding handle for a property update
    pub fn supersede(&self, properties: ServiceProperties) -> ProviderHandle {
        ProviderHandle {
            capability: self.capability.clone(),
            registration_id: self.registration_id,
            properties,
        }
    }

    /// Produce a view of this handle with a replaced property dictionary
    ///
    /// Used by tracking interceptors to decorate a candidate without touching
    /// the registry's own record.
    pub fn with_properties(&self, properties: ServiceProperties) -> ProviderHandle {
        self.supersede(properties)
    }

    /// Registry preference order: ranking descending, registration id
    /// ascending. On equal rank the first-registered provider wins.
    pub fn registry_cmp(&self, other: &ProviderHandle) -> Ordering {
        other
            .ranking()
            .cmp(&self.ranking())
            .then(self.registration_id.cmp(&other.registration_id))
    }
}

impl fmt::Display for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.capability, self.registration_id)
    }
}
