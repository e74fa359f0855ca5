//! Engine facade
//!
//! Owns the registry, the interceptor and context-source registries, and
//! the set of managed components. There is no ambient singleton: create an
//! [`Engine`] at runtime start, hand out references, and call
//! [`Engine::shutdown`] at the end.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use patchbay_domain::declaration::ComponentDeclaration;
use patchbay_domain::error::{Error, Result};
use patchbay_domain::introspection::ComponentDescription;
use patchbay_domain::ports::lifecycle::ComponentLifecycle;
use patchbay_domain::ports::state_listener::ComponentStateListener;

use crate::component::{ComponentIndex, ManagedComponent};
use crate::config::EngineConfig;
use crate::context::{ContextSourceHandle, ContextSourceRegistry};
use crate::interceptors::InterceptorRegistry;
use crate::registry::ServiceRegistry;

/// The component wiring engine
pub struct Engine {
    config: EngineConfig,
    registry: Arc<ServiceRegistry>,
    interceptors: Arc<InterceptorRegistry>,
    contexts: Arc<ContextSourceRegistry>,
    components: Arc<ComponentIndex>,
}

impl Engine {
    /// Create an engine with default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with explicit configuration
    pub fn with_config(config: EngineConfig) -> Self {
        let components = Arc::new(ComponentIndex::new());
        Self {
            config,
            registry: Arc::new(ServiceRegistry::new()),
            interceptors: Arc::new(InterceptorRegistry::new(Arc::clone(&components))),
            contexts: Arc::new(ContextSourceRegistry::new(Arc::clone(&components))),
            components,
        }
    }

    /// The provider registry
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// The interceptor registry
    pub fn interceptors(&self) -> &Arc<InterceptorRegistry> {
        &self.interceptors
    }

    /// Register a named context source for indirect filter resolution
    pub fn register_context_source(&self, name: &str) -> Result<ContextSourceHandle> {
        self.contexts.register(name)
    }

    /// Declare a component. The component starts out inactive; call
    /// [`Engine::enable`] to begin tracking its dependencies.
    ///
    /// Returns the engine-assigned component id. Several instances of the
    /// same declaration may coexist; each gets its own id.
    pub fn declare(
        &self,
        declaration: ComponentDeclaration,
        lifecycle: Box<dyn ComponentLifecycle>,
    ) -> Result<String> {
        declaration.check()?;
        let id = format!("{}-{}", declaration.name, Uuid::new_v4().simple());
        let component = ManagedComponent::new(
            id.clone(),
            declaration,
            lifecycle,
            &self.registry,
            &self.interceptors,
            &self.contexts,
            self.config.gate.queue_warn_depth,
        );
        self.components.insert(component);
        info!(component = %id, "component declared");
        Ok(id)
    }

    /// Request activation tracking for a component. Enqueues onto the
    /// component's gate and returns immediately; completion is observable
    /// through [`Engine::describe`] or a registered state listener.
    pub fn enable(&self, id: &str) -> Result<()> {
        let component = self.component(id)?;
        if let Some(gate) = component.submit_enable(true) {
            gate.drain();
        }
        Ok(())
    }

    /// Request deactivation for a component; asynchronous like
    /// [`Engine::enable`]
    pub fn disable(&self, id: &str) -> Result<()> {
        let component = self.component(id)?;
        if let Some(gate) = component.submit_enable(false) {
            gate.drain();
        }
        Ok(())
    }

    /// Observe a component's committed state transitions
    pub fn add_state_listener(
        &self,
        id: &str,
        listener: Arc<dyn ComponentStateListener>,
    ) -> Result<()> {
        let component = self.component(id)?;
        if let Some(gate) = component.submit_add_listener(listener) {
            gate.drain();
        }
        Ok(())
    }

    /// Replace a dependency's filter template at runtime
    pub fn set_dependency_filter(
        &self,
        id: &str,
        dependency: &str,
        filter: Option<String>,
    ) -> Result<()> {
        let component = self.component(id)?;
        if let Some(gate) = component.submit_set_filter(dependency.to_string(), filter) {
            gate.drain();
        }
        Ok(())
    }

    /// Destroy a component: deactivate if needed, run `destroy`, release
    /// its dependencies, and close its gate. Pending work queued behind the
    /// destroy is discarded; no callback fires afterwards.
    pub fn destroy(&self, id: &str) -> Result<()> {
        let component = self.component(id)?;
        if let Some(gate) = component.submit_destroy() {
            gate.drain();
        }
        self.components.remove(id);
        Ok(())
    }

    /// Eventually consistent snapshot of one component
    pub fn describe(&self, id: &str) -> Result<ComponentDescription> {
        let component = self.component(id)?;
        Ok(component.description().as_ref().clone())
    }

    /// Eventually consistent snapshots of every live component
    pub fn describe_all(&self) -> Vec<ComponentDescription> {
        let mut descriptions: Vec<ComponentDescription> = self
            .components
            .all()
            .iter()
            .map(|component| component.description().as_ref().clone())
            .collect();
        descriptions.sort_by(|a, b| a.id.cmp(&b.id));
        descriptions
    }

    /// Destroy every component and dispose of the registry
    pub fn shutdown(&self) {
        info!("engine shutting down");
        for component in self.components.all() {
            if let Some(gate) = component.submit_destroy() {
                gate.drain();
            }
            self.components.remove(component.id());
        }
        self.registry.dispose();
    }

    fn component(&self, id: &str) -> Result<Arc<ManagedComponent>> {
        self.components
            .get(id)
            .ok_or_else(|| Error::component_not_found(id))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
