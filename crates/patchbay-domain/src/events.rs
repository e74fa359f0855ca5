//! Service change events
//!
//! The registry stamps every mutation with a global sequence number and
//! publishes one of these events to subscribed dependencies. `Swapped` is
//! synthesized by a dynamic singular dependency when its top candidate
//! changes identity.

use serde::Serialize;

use crate::value_objects::ProviderHandle;

/// A change in the set of registered providers for one capability type
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceEvent {
    /// A provider was registered
    Added(ProviderHandle),
    /// A provider was unregistered
    Removed(ProviderHandle),
    /// A provider's properties were updated; same registration id
    Changed {
        /// The superseded handle
        old: ProviderHandle,
        /// The superseding handle
        new: ProviderHandle,
    },
    /// The preferred provider of a singular dependency changed identity
    Swapped {
        /// The previously bound handle
        old: ProviderHandle,
        /// The newly bound handle
        new: ProviderHandle,
    },
}

impl ServiceEvent {
    /// Short name of the event kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceEvent::Added(_) => "added",
            ServiceEvent::Removed(_) => "removed",
            ServiceEvent::Changed { .. } => "changed",
            ServiceEvent::Swapped { .. } => "swapped",
        }
    }

    /// The capability type the event concerns
    pub fn capability(&self) -> &str {
        match self {
            ServiceEvent::Added(handle) | ServiceEvent::Removed(handle) => handle.capability(),
            ServiceEvent::Changed { new, .. } | ServiceEvent::Swapped { new, .. } => {
                new.capability()
            }
        }
    }
}

/// A [`ServiceEvent`] paired with its registry sequence number
///
/// Sequence numbers give events a total order per capability type; a
/// dependency observes them strictly in this order.
#[derive(Debug, Clone, Serialize)]
pub struct SequencedEvent {
    /// Position in the registry's global mutation order
    pub sequence: u64,
    /// The change itself
    pub event: ServiceEvent,
}
