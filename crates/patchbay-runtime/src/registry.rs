//! Process-wide service registry
//!
//! The registry indexes provider instances by capability type and stamps
//! every mutation with a global sequence number. Subscribed dependencies
//! receive events in sequence order: jobs are pushed onto subscriber gates
//! while the index lock is held (a queue append, never component code) and
//! the gates are drained only after the lock is released. That keeps the
//! lock short and makes the observed order per capability type total.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use patchbay_domain::error::{Error, Result};
use patchbay_domain::events::{SequencedEvent, ServiceEvent};
use patchbay_domain::filter::Filter;
use patchbay_domain::value_objects::{ProviderHandle, ServiceProperties};

use crate::gate::Gate;
use crate::locks::lock_mutex;

/// The payload registered alongside a provider handle
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Receiver half of a registry subscription
///
/// `enqueue` must only append to the recipient's gate and hand the gate
/// back; it is called with the registry lock held and must not run
/// component code.
pub trait EventSink: Send + Sync {
    /// Queue the event for the recipient. Returns the gate to drain once
    /// the registry lock is released, or `None` when the recipient is gone.
    fn enqueue(&self, event: SequencedEvent) -> Option<Arc<Gate>>;
}

/// Identifies one subscription for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Registration {
    handle: ProviderHandle,
    instance: ServiceInstance,
}

struct Subscriber {
    id: SubscriptionId,
    sink: Arc<dyn EventSink>,
}

#[derive(Default)]
struct RegistryInner {
    next_registration_id: u64,
    next_subscription_id: u64,
    sequence: u64,
    providers: HashMap<String, Vec<Registration>>,
    subscribers: HashMap<String, Vec<Subscriber>>,
}

impl RegistryInner {
    /// Append the event to every subscriber gate, collecting the gates so
    /// the caller can drain them after unlocking.
    fn dispatch(&mut self, capability: &str, event: ServiceEvent) -> Vec<Arc<Gate>> {
        self.sequence += 1;
        let sequenced = SequencedEvent {
            sequence: self.sequence,
            event,
        };
        let mut gates = Vec::new();
        if let Some(subscribers) = self.subscribers.get_mut(capability) {
            subscribers.retain(|subscriber| {
                match subscriber.sink.enqueue(sequenced.clone()) {
                    Some(gate) => {
                        gates.push(gate);
                        true
                    }
                    // The owning component is gone; drop the subscription.
                    None => false,
                }
            });
        }
        gates
    }

    fn find_registration(
        &self,
        handle: &ProviderHandle,
    ) -> Option<(usize, &Vec<Registration>)> {
        let registrations = self.providers.get(handle.capability())?;
        let position = registrations
            .iter()
            .position(|r| r.handle.registration_id() == handle.registration_id())?;
        Some((position, registrations))
    }
}

/// Index of live providers with filter lookup and change notification
pub struct ServiceRegistry {
    inner: Mutex<RegistryInner>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Publish a provider instance under a capability type
    pub fn register(
        &self,
        capability: &str,
        instance: ServiceInstance,
        properties: ServiceProperties,
    ) -> Result<ProviderHandle> {
        let capability = capability.trim();
        if capability.is_empty() {
            return Err(Error::invalid_registration(
                "capability type must not be empty",
            ));
        }
        let (handle, gates) = {
            let mut inner = lock_mutex(&self.inner, "ServiceRegistry::register")?;
            inner.next_registration_id += 1;
            let handle =
                ProviderHandle::new(capability, inner.next_registration_id, properties);
            inner
                .providers
                .entry(capability.to_string())
                .or_default()
                .push(Registration {
                    handle: handle.clone(),
                    instance,
                });
            let gates = inner.dispatch(capability, ServiceEvent::Added(handle.clone()));
            (handle, gates)
        };
        debug!(capability, id = handle.registration_id(), "provider registered");
        drain_all(gates);
        Ok(handle)
    }

    /// Convenience wrapper for registering a concrete instance
    pub fn register_instance<T: Any + Send + Sync>(
        &self,
        capability: &str,
        instance: T,
        properties: ServiceProperties,
    ) -> Result<ProviderHandle> {
        self.register(capability, Arc::new(instance), properties)
    }

    /// Replace a provider's properties, superseding its handle
    pub fn update(
        &self,
        handle: &ProviderHandle,
        properties: ServiceProperties,
    ) -> Result<ProviderHandle> {
        let (new_handle, gates) = {
            let mut inner = lock_mutex(&self.inner, "ServiceRegistry::update")?;
            let Some((position, _)) = inner.find_registration(handle) else {
                return Err(Error::unknown_handle(
                    handle.capability(),
                    handle.registration_id(),
                ));
            };
            let capability = handle.capability().to_string();
            let registrations = inner
                .providers
                .get_mut(&capability)
                .ok_or_else(|| Error::internal("provider index out of sync"))?;
            let old_handle = registrations[position].handle.clone();
            let new_handle = old_handle.supersede(properties);
            registrations[position].handle = new_handle.clone();
            let gates = inner.dispatch(
                &capability,
                ServiceEvent::Changed {
                    old: old_handle,
                    new: new_handle.clone(),
                },
            );
            (new_handle, gates)
        };
        debug!(
            capability = new_handle.capability(),
            id = new_handle.registration_id(),
            "provider properties updated"
        );
        drain_all(gates);
        Ok(new_handle)
    }

    /// Withdraw a provider
    pub fn unregister(&self, handle: &ProviderHandle) -> Result<()> {
        let gates = {
            let mut inner = lock_mutex(&self.inner, "ServiceRegistry::unregister")?;
            let Some((position, _)) = inner.find_registration(handle) else {
                return Err(Error::unknown_handle(
                    handle.capability(),
                    handle.registration_id(),
                ));
            };
            let capability = handle.capability().to_string();
            let registrations = inner
                .providers
                .get_mut(&capability)
                .ok_or_else(|| Error::internal("provider index out of sync"))?;
            let removed = registrations.remove(position);
            if registrations.is_empty() {
                inner.providers.remove(&capability);
            }
            inner.dispatch(&capability, ServiceEvent::Removed(removed.handle))
        };
        debug!(
            capability = handle.capability(),
            id = handle.registration_id(),
            "provider unregistered"
        );
        drain_all(gates);
        Ok(())
    }

    /// Providers of a capability matching an optional filter, ordered by
    /// ranking descending then registration id ascending
    pub fn find_matching(
        &self,
        capability: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<ProviderHandle>> {
        let inner = lock_mutex(&self.inner, "ServiceRegistry::find_matching")?;
        let mut handles: Vec<ProviderHandle> = inner
            .providers
            .get(capability)
            .map(|registrations| {
                registrations
                    .iter()
                    .filter(|r| {
                        filter
                            .map(|f| f.matches(r.handle.properties()))
                            .unwrap_or(true)
                    })
                    .map(|r| r.handle.clone())
                    .collect()
            })
            .unwrap_or_default();
        handles.sort_by(ProviderHandle::registry_cmp);
        Ok(handles)
    }

    /// Subscribe to changes of a capability type
    ///
    /// Returns the subscription id plus a snapshot of the currently
    /// registered handles in registration order, taken under the same lock
    /// as the subscription itself: the subscriber misses no event and sees
    /// no event for providers absent from the snapshot.
    pub fn subscribe(
        &self,
        capability: &str,
        sink: Arc<dyn EventSink>,
    ) -> Result<(SubscriptionId, Vec<ProviderHandle>)> {
        let mut inner = lock_mutex(&self.inner, "ServiceRegistry::subscribe")?;
        inner.next_subscription_id += 1;
        let id = SubscriptionId(inner.next_subscription_id);
        inner
            .subscribers
            .entry(capability.to_string())
            .or_default()
            .push(Subscriber { id, sink });
        let snapshot = inner
            .providers
            .get(capability)
            .map(|registrations| registrations.iter().map(|r| r.handle.clone()).collect())
            .unwrap_or_default();
        Ok((id, snapshot))
    }

    /// Remove a subscription; unknown ids are a no-op
    pub fn unsubscribe(&self, capability: &str, id: SubscriptionId) -> Result<()> {
        let mut inner = lock_mutex(&self.inner, "ServiceRegistry::unsubscribe")?;
        if let Some(subscribers) = inner.subscribers.get_mut(capability) {
            subscribers.retain(|subscriber| subscriber.id != id);
            if subscribers.is_empty() {
                inner.subscribers.remove(capability);
            }
        }
        Ok(())
    }

    /// The registered payload for a live handle
    pub fn get_instance(&self, handle: &ProviderHandle) -> Result<ServiceInstance> {
        let inner = lock_mutex(&self.inner, "ServiceRegistry::get_instance")?;
        inner
            .find_registration(handle)
            .map(|(position, registrations)| Arc::clone(&registrations[position].instance))
            .ok_or_else(|| {
                Error::unknown_handle(handle.capability(), handle.registration_id())
            })
    }

    /// Number of live provider registrations
    pub fn provider_count(&self) -> usize {
        lock_mutex(&self.inner, "ServiceRegistry::provider_count")
            .map(|inner| inner.providers.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Capability types with at least one live provider
    pub fn capability_types(&self) -> Vec<String> {
        lock_mutex(&self.inner, "ServiceRegistry::capability_types")
            .map(|inner| {
                let mut types: Vec<String> = inner.providers.keys().cloned().collect();
                types.sort();
                types
            })
            .unwrap_or_default()
    }

    /// Drop all providers and subscriptions; part of engine shutdown
    pub fn dispose(&self) {
        if let Ok(mut inner) = lock_mutex(&self.inner, "ServiceRegistry::dispose") {
            let providers: usize = inner.providers.values().map(Vec::len).sum();
            if providers > 0 {
                warn!(providers, "registry disposed with live providers");
            }
            inner.providers.clear();
            inner.subscribers.clear();
        }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn drain_all(gates: Vec<Arc<Gate>>) {
    for gate in gates {
        gate.drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct Recorder {
        gate: Arc<Gate>,
        seen: Arc<StdMutex<Vec<(u64, String)>>>,
    }

    impl EventSink for Recorder {
        fn enqueue(&self, event: SequencedEvent) -> Option<Arc<Gate>> {
            let seen = Arc::clone(&self.seen);
            self.gate.enqueue(Box::new(move || {
                seen.lock()
                    .unwrap()
                    .push((event.sequence, event.event.kind().to_string()));
            }));
            Some(Arc::clone(&self.gate))
        }
    }

    fn recorder() -> (Arc<Recorder>, Arc<StdMutex<Vec<(u64, String)>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::new(Recorder {
            gate: Arc::new(Gate::new("recorder", 1024)),
            seen: Arc::clone(&seen),
        });
        (sink, seen)
    }

    #[test]
    fn test_register_rejects_empty_capability() {
        let registry = ServiceRegistry::new();
        let result = registry.register_instance("  ", 1u32, ServiceProperties::new());
        assert!(matches!(result, Err(Error::InvalidRegistration { .. })));
    }

    #[test]
    fn test_unknown_handle_is_reported() {
        let registry = ServiceRegistry::new();
        let handle = registry
            .register_instance("cap", 1u32, ServiceProperties::new())
            .unwrap();
        registry.unregister(&handle).unwrap();
        assert!(matches!(
            registry.unregister(&handle),
            Err(Error::UnknownHandle { .. })
        ));
        assert!(matches!(
            registry.update(&handle, ServiceProperties::new()),
            Err(Error::UnknownHandle { .. })
        ));
    }

    #[test]
    fn test_find_matching_orders_by_rank_then_id() {
        use patchbay_domain::constants::RANKING_PROPERTY;
        let registry = ServiceRegistry::new();
        let a = registry
            .register_instance("cap", 1u32, ServiceProperties::new().with(RANKING_PROPERTY, 1i64))
            .unwrap();
        let b = registry
            .register_instance("cap", 2u32, ServiceProperties::new().with(RANKING_PROPERTY, 3i64))
            .unwrap();
        let c = registry
            .register_instance("cap", 3u32, ServiceProperties::new().with(RANKING_PROPERTY, 3i64))
            .unwrap();
        let matched = registry.find_matching("cap", None).unwrap();
        let ids: Vec<u64> = matched.iter().map(ProviderHandle::registration_id).collect();
        // b and c share the top rank; b registered first and wins the tie.
        assert_eq!(
            ids,
            vec![
                b.registration_id(),
                c.registration_id(),
                a.registration_id()
            ]
        );
    }

    #[test]
    fn test_events_carry_increasing_sequence_numbers() {
        let registry = ServiceRegistry::new();
        let (sink, seen) = recorder();
        registry.subscribe("cap", sink).unwrap();
        let handle = registry
            .register_instance("cap", 1u32, ServiceProperties::new())
            .unwrap();
        let updated = registry
            .update(&handle, ServiceProperties::new().with("x", 1i64))
            .unwrap();
        registry.unregister(&updated).unwrap();

        let seen = seen.lock().unwrap();
        let kinds: Vec<&str> = seen.iter().map(|(_, k)| k.as_str()).collect();
        assert_eq!(kinds, vec!["added", "changed", "removed"]);
        assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_subscription_snapshot_contains_existing_providers() {
        let registry = ServiceRegistry::new();
        let handle = registry
            .register_instance("cap", 1u32, ServiceProperties::new())
            .unwrap();
        let (sink, seen) = recorder();
        let (_, snapshot) = registry.subscribe("cap", sink).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].same_registration(&handle));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_get_instance_returns_registered_payload() {
        let registry = ServiceRegistry::new();
        let handle = registry
            .register_instance("cap", 41u32, ServiceProperties::new())
            .unwrap();
        let instance = registry.get_instance(&handle).unwrap();
        assert_eq!(*instance.downcast::<u32>().unwrap(), 41);
    }
}
