//! Context sources for indirect filters
//!
//! A context source is a named, mutable key/value map owned by whoever
//! registered it. Dependencies whose filter templates reference
//! `${source.key}` placeholders stay unresolved until every referenced key
//! exists; any change to a referenced source (including removal, which
//! reverts the dependency to unresolved) pushes a re-resolution onto the
//! affected components' gates.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tracing::{debug, info};

use patchbay_domain::error::{Error, Result};
use patchbay_domain::filter::{ContextBindings, Placeholder};
use patchbay_domain::value_objects::PropertyValue;

use crate::component::{ComponentIndex, InvalidationScope};
use crate::locks::{lock_rwlock_read, lock_rwlock_write};

struct SourceState {
    values: RwLock<BTreeMap<String, PropertyValue>>,
}

/// Registry of named context sources
pub struct ContextSourceRegistry {
    components: Arc<ComponentIndex>,
    sources: DashMap<String, Arc<SourceState>>,
}

impl ContextSourceRegistry {
    pub(crate) fn new(components: Arc<ComponentIndex>) -> Self {
        Self {
            components,
            sources: DashMap::new(),
        }
    }

    /// Register a source under a unique name. Dropping the returned handle
    /// unregisters the source and re-resolves referencing dependencies.
    pub fn register(self: &Arc<Self>, name: &str) -> Result<ContextSourceHandle> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_registration(
                "context source name must not be empty",
            ));
        }
        let state = Arc::new(SourceState {
            values: RwLock::new(BTreeMap::new()),
        });
        match self.sources.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(Error::invalid_registration(format!(
                    "context source `{}` is already registered",
                    name
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&state));
            }
        }
        info!(source = name, "context source registered");
        self.notify(name);
        Ok(ContextSourceHandle {
            registry: Arc::clone(self),
            state,
            name: name.to_string(),
        })
    }

    /// Current values for the referenced placeholders
    pub(crate) fn bindings_for(&self, placeholders: &[Placeholder]) -> ContextBindings {
        let mut bindings = ContextBindings::new();
        for placeholder in placeholders {
            if let Some(state) = self.sources.get(&placeholder.source) {
                if let Ok(values) =
                    lock_rwlock_read(&state.values, "ContextSourceRegistry::bindings_for")
                {
                    if let Some(value) = values.get(&placeholder.key) {
                        bindings.set(
                            placeholder.source.clone(),
                            placeholder.key.clone(),
                            value.clone(),
                        );
                    }
                }
            }
        }
        bindings
    }

    /// Re-resolve every dependency referencing `source`
    fn notify(&self, source: &str) {
        let scope = InvalidationScope::Source(source.to_string());
        let mut gates = Vec::new();
        for component in self.components.all() {
            if let Some(gate) = component.submit_invalidation(scope.clone()) {
                gates.push(gate);
            }
        }
        for gate in gates {
            gate.drain();
        }
    }

    fn unregister(&self, name: &str) {
        if self.sources.remove(name).is_some() {
            info!(source = name, "context source unregistered");
            self.notify(name);
        }
    }
}

/// Owner-side handle to a registered context source
///
/// The registry keeps only a non-owning view; dropping this handle removes
/// the source.
pub struct ContextSourceHandle {
    registry: Arc<ContextSourceRegistry>,
    state: Arc<SourceState>,
    name: String,
}

impl ContextSourceHandle {
    /// The source's registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set a key; referencing dependencies re-resolve before this returns
    pub fn set<K: Into<String>, V: Into<PropertyValue>>(&self, key: K, value: V) {
        let key = key.into();
        if let Ok(mut values) = lock_rwlock_write(&self.state.values, "ContextSourceHandle::set") {
            values.insert(key.clone(), value.into());
        }
        debug!(source = %self.name, key = %key, "context key updated");
        self.registry.notify(&self.name);
    }

    /// Clear a key; dependencies whose filters reference it become
    /// unresolved again
    pub fn remove(&self, key: &str) {
        let removed = match lock_rwlock_write(&self.state.values, "ContextSourceHandle::remove") {
            Ok(mut values) => values.remove(key).is_some(),
            Err(_) => false,
        };
        if removed {
            debug!(source = %self.name, key, "context key cleared");
            self.registry.notify(&self.name);
        }
    }

    /// Read a key's current value
    pub fn get(&self, key: &str) -> Option<PropertyValue> {
        lock_rwlock_read(&self.state.values, "ContextSourceHandle::get")
            .ok()
            .and_then(|values| values.get(key).cloned())
    }
}

impl Drop for ContextSourceHandle {
    fn drop(&mut self) {
        self.registry.unregister(&self.name);
    }
}
