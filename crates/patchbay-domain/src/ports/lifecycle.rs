//! Component lifecycle callbacks
//!
//! The engine invokes these typed callbacks instead of discovering methods
//! dynamically. All of them run on the owning component's gate, never
//! concurrently with another callback of the same component, so
//! implementations may mutate their own state freely. A callback returning
//! an error is logged and reverts the component to waiting; it never crashes
//! the engine.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::value_objects::{ProviderHandle, ServiceProperties};

/// A provider handed to a component: registry identity plus the registered
/// service instance
#[derive(Clone)]
pub struct ServiceBinding {
    handle: ProviderHandle,
    instance: Arc<dyn Any + Send + Sync>,
}

impl ServiceBinding {
    /// Pair a handle with its service instance
    pub fn new(handle: ProviderHandle, instance: Arc<dyn Any + Send + Sync>) -> Self {
        Self { handle, instance }
    }

    /// Registry identity of the bound provider
    pub fn handle(&self) -> &ProviderHandle {
        &self.handle
    }

    /// The registered service instance, untyped
    pub fn instance(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.instance)
    }

    /// Downcast the service instance to a concrete type
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.instance).downcast::<T>().ok()
    }
}

impl fmt::Debug for ServiceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBinding")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Read view handed to lifecycle callbacks: component identity, declared
/// properties, and eagerly resolved dependencies
#[derive(Debug, Clone)]
pub struct ComponentContext {
    name: String,
    properties: ServiceProperties,
    eager: BTreeMap<String, ServiceBinding>,
}

impl ComponentContext {
    /// Assembled by the runtime before `init` runs
    pub fn new(
        name: String,
        properties: ServiceProperties,
        eager: BTreeMap<String, ServiceBinding>,
    ) -> Self {
        Self {
            name,
            properties,
            eager,
        }
    }

    /// The component's declared name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The component's declared properties
    pub fn properties(&self) -> &ServiceProperties {
        &self.properties
    }

    /// An eagerly resolved dependency, by its declared name
    pub fn eager(&self, dependency: &str) -> Option<&ServiceBinding> {
        self.eager.get(dependency)
    }
}

/// Typed lifecycle callbacks of a managed component
///
/// Every method has a no-op default so implementations only spell out the
/// phases they care about.
pub trait ComponentLifecycle: Send {
    /// Runs once when all required dependencies are first satisfied, before
    /// any `bind`. Eager dependencies are already resolved in `ctx`.
    fn init(&mut self, ctx: &ComponentContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Runs after all bind callbacks on activation
    fn start(&mut self, ctx: &ComponentContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Runs when a required dependency is lost, before unbinding
    fn stop(&mut self, ctx: &ComponentContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Runs once when the component is destroyed
    fn destroy(&mut self, ctx: &ComponentContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// A provider joined the dependency's bound set
    fn bind(&mut self, dependency: &str, binding: &ServiceBinding) -> Result<()> {
        let _ = (dependency, binding);
        Ok(())
    }

    /// A provider left the dependency's bound set
    fn unbind(&mut self, dependency: &str, binding: &ServiceBinding) -> Result<()> {
        let _ = (dependency, binding);
        Ok(())
    }

    /// The preferred provider of a singular dynamic dependency changed.
    /// Defaults to `unbind` old then `bind` new.
    fn swap(
        &mut self,
        dependency: &str,
        old: &ServiceBinding,
        new: &ServiceBinding,
    ) -> Result<()> {
        self.unbind(dependency, old)?;
        self.bind(dependency, new)
    }
}
