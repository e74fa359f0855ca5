//! Managed components and their state machine
//!
//! A [`ManagedComponent`] owns the gate, the dependency trackers, and the
//! lifecycle implementation for one declared component. State transitions
//! follow an explicit calculate/perform loop: after every dependency
//! outcome the next state is derived from the enabled flag and aggregate
//! satisfaction, and the corresponding side effects (open/close trackers,
//! init/bind/start, stop/unbind, destroy) run as part of committing the
//! transition.
//!
//! Lifecycle callbacks run on the gate, never concurrently for one
//! component. A callback that fails is logged with the component and
//! dependency identity and forces a reversion to waiting; re-activation
//! then waits for the next dependency event.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use arc_swap::ArcSwap;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use patchbay_domain::declaration::{ComponentDeclaration, InjectionMode};
use patchbay_domain::error::Error;
use patchbay_domain::events::SequencedEvent;
use patchbay_domain::filter::Filter;
use patchbay_domain::introspection::ComponentDescription;
use patchbay_domain::ports::lifecycle::{ComponentContext, ComponentLifecycle, ServiceBinding};
use patchbay_domain::ports::state_listener::ComponentStateListener;
use patchbay_domain::value_objects::{ComponentState, ServiceProperties};

use crate::context::ContextSourceRegistry;
use crate::dependency::{BindingChange, DependencyTracker, RecomputeOutcome};
use crate::gate::Gate;
use crate::interceptors::InterceptorRegistry;
use crate::locks::lock_mutex;
use crate::registry::{EventSink, ServiceRegistry};

/// Which dependencies an external invalidation applies to
#[derive(Clone)]
pub(crate) enum InvalidationScope {
    /// Every dependency
    All,
    /// Dependencies whose metadata matches an interceptor target filter
    Target(Filter),
    /// Dependencies whose filter template references a context source
    Source(String),
}

/// Shared index of live components, consulted by the interceptor and
/// context registries when broadcasting invalidations
pub(crate) struct ComponentIndex {
    map: DashMap<String, Arc<ManagedComponent>>,
}

impl ComponentIndex {
    pub(crate) fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    pub(crate) fn insert(&self, component: Arc<ManagedComponent>) {
        self.map.insert(component.id.clone(), component);
    }

    pub(crate) fn remove(&self, id: &str) -> Option<Arc<ManagedComponent>> {
        self.map.remove(id).map(|(_, component)| component)
    }

    pub(crate) fn get(&self, id: &str) -> Option<Arc<ManagedComponent>> {
        self.map.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn all(&self) -> Vec<Arc<ManagedComponent>> {
        self.map
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

/// Routes registry events for one dependency onto the owning component's
/// gate
struct DependencyRoute {
    component: Weak<ManagedComponent>,
    dep_index: usize,
}

impl EventSink for DependencyRoute {
    fn enqueue(&self, event: SequencedEvent) -> Option<Arc<Gate>> {
        let component = self.component.upgrade()?;
        component.submit_event(self.dep_index, event)
    }
}

struct ComponentCore {
    properties: ServiceProperties,
    lifecycle: Box<dyn ComponentLifecycle>,
    state: ComponentState,
    enabled: bool,
    /// Set after a failed activation so the state machine does not spin;
    /// cleared by the next dependency event, invalidation, or enable
    activation_blocked: bool,
    dependencies: Vec<DependencyTracker>,
    context: Option<ComponentContext>,
    listeners: Vec<Arc<dyn ComponentStateListener>>,
    last_error: Option<String>,
}

/// One declared component under engine management
pub(crate) struct ManagedComponent {
    id: String,
    name: String,
    gate: Arc<Gate>,
    core: Mutex<ComponentCore>,
    snapshot: ArcSwap<ComponentDescription>,
}

impl ManagedComponent {
    pub(crate) fn new(
        id: String,
        declaration: ComponentDeclaration,
        lifecycle: Box<dyn ComponentLifecycle>,
        registry: &Arc<ServiceRegistry>,
        interceptors: &Arc<InterceptorRegistry>,
        contexts: &Arc<ContextSourceRegistry>,
        gate_warn_depth: usize,
    ) -> Arc<Self> {
        let name = declaration.name.clone();
        let dependencies: Vec<DependencyTracker> = declaration
            .dependencies
            .iter()
            .map(|dependency| {
                DependencyTracker::new(
                    &name,
                    dependency.clone(),
                    Arc::clone(registry),
                    Arc::clone(interceptors),
                    Arc::clone(contexts),
                )
            })
            .collect();
        let core = ComponentCore {
            properties: declaration.properties,
            lifecycle,
            state: ComponentState::Inactive,
            enabled: false,
            activation_blocked: false,
            dependencies,
            context: None,
            listeners: Vec::new(),
            last_error: None,
        };
        let initial = describe_core(&id, &name, &core);
        Arc::new(Self {
            gate: Arc::new(Gate::new(id.clone(), gate_warn_depth)),
            id,
            name,
            core: Mutex::new(core),
            snapshot: ArcSwap::from_pointee(initial),
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// Latest published snapshot; lock-free and safe during gate activity
    pub(crate) fn description(&self) -> Arc<ComponentDescription> {
        self.snapshot.load_full()
    }

    /// Queue a core job; returns the gate for the caller to drain
    fn submit<F>(self: &Arc<Self>, f: F) -> Option<Arc<Gate>>
    where
        F: FnOnce(&Arc<ManagedComponent>, &mut ComponentCore) + Send + 'static,
    {
        let me = Arc::clone(self);
        let queued = self.gate.enqueue(Box::new(move || {
            match lock_mutex(&me.core, "ManagedComponent::core") {
                Ok(mut core) => {
                    f(&me, &mut core);
                    me.publish(&core);
                }
                Err(lock_error) => {
                    error!(component = %me.id, %lock_error, "component core unavailable");
                }
            }
        }));
        queued.then(|| Arc::clone(&self.gate))
    }

    pub(crate) fn submit_enable(self: &Arc<Self>, enabled: bool) -> Option<Arc<Gate>> {
        self.submit(move |me, core| {
            if core.state == ComponentState::Destroyed {
                return;
            }
            core.enabled = enabled;
            if enabled {
                core.activation_blocked = false;
            }
            core.handle_change(me);
        })
    }

    pub(crate) fn submit_event(
        self: &Arc<Self>,
        dep_index: usize,
        event: SequencedEvent,
    ) -> Option<Arc<Gate>> {
        self.submit(move |me, core| {
            if !core.is_tracking() || dep_index >= core.dependencies.len() {
                return;
            }
            core.activation_blocked = false;
            let active = core.state == ComponentState::Active;
            debug!(
                component = %me.id,
                dependency = core.dependencies[dep_index].name(),
                sequence = event.sequence,
                kind = event.event.kind(),
                "processing registry event"
            );
            let outcome = core.dependencies[dep_index].on_event(&event.event, active);
            core.apply_outcome(me, dep_index, outcome);
        })
    }

    pub(crate) fn submit_invalidation(self: &Arc<Self>, scope: InvalidationScope) -> Option<Arc<Gate>> {
        self.submit(move |me, core| {
            if !core.is_tracking() {
                return;
            }
            core.activation_blocked = false;
            let indices: Vec<usize> = core
                .dependencies
                .iter()
                .enumerate()
                .filter(|(_, dependency)| dependency.in_scope(&scope))
                .map(|(index, _)| index)
                .collect();
            for index in indices {
                if !core.is_tracking() {
                    break;
                }
                let active = core.state == ComponentState::Active;
                let outcome = core.dependencies[index].recompute(active);
                core.apply_outcome(me, index, outcome);
            }
        })
    }

    pub(crate) fn submit_set_filter(
        self: &Arc<Self>,
        dependency: String,
        filter: Option<String>,
    ) -> Option<Arc<Gate>> {
        self.submit(move |me, core| {
            let Some(index) = core
                .dependencies
                .iter()
                .position(|tracker| tracker.name() == dependency)
            else {
                warn!(component = %me.id, dependency = %dependency, "cannot reconfigure unknown dependency");
                return;
            };
            match core.dependencies[index].set_filter(filter) {
                Ok(()) => {
                    if core.is_tracking() {
                        core.activation_blocked = false;
                        let active = core.state == ComponentState::Active;
                        let outcome = core.dependencies[index].recompute(active);
                        core.apply_outcome(me, index, outcome);
                    }
                }
                Err(set_error) => {
                    warn!(component = %me.id, dependency = %dependency, %set_error, "filter reconfiguration rejected");
                    core.dependencies[index].record_error(&set_error);
                }
            }
        })
    }

    pub(crate) fn submit_add_listener(
        self: &Arc<Self>,
        listener: Arc<dyn ComponentStateListener>,
    ) -> Option<Arc<Gate>> {
        self.submit(move |_, core| core.listeners.push(listener))
    }

    pub(crate) fn submit_destroy(self: &Arc<Self>) -> Option<Arc<Gate>> {
        self.submit(|me, core| core.destroy(me))
    }

    fn publish(&self, core: &ComponentCore) {
        self.snapshot
            .store(Arc::new(describe_core(&self.id, &self.name, core)));
    }
}

impl ComponentCore {
    /// Whether dependencies are currently subscribed (waiting or active)
    fn is_tracking(&self) -> bool {
        matches!(self.state, ComponentState::Waiting | ComponentState::Active)
    }

    fn all_gating_satisfied(&self) -> bool {
        self.dependencies
            .iter()
            .filter(|dependency| dependency.gates_satisfaction())
            .all(DependencyTracker::is_satisfied)
    }

    fn calculate_state(&self) -> ComponentState {
        match self.state {
            ComponentState::Inactive => {
                if self.enabled {
                    ComponentState::Waiting
                } else {
                    ComponentState::Inactive
                }
            }
            ComponentState::Waiting => {
                if !self.enabled {
                    ComponentState::Inactive
                } else if !self.activation_blocked && self.all_gating_satisfied() {
                    ComponentState::Active
                } else {
                    ComponentState::Waiting
                }
            }
            ComponentState::Active => {
                if !self.enabled || !self.all_gating_satisfied() {
                    ComponentState::Waiting
                } else {
                    ComponentState::Active
                }
            }
            ComponentState::Destroyed => ComponentState::Destroyed,
        }
    }

    /// Run the state machine until it settles
    fn handle_change(&mut self, me: &Arc<ManagedComponent>) {
        loop {
            let old = self.state;
            let new = self.calculate_state();
            if new == old {
                break;
            }
            if !self.perform_transition(me, old, new) {
                break;
            }
        }
    }

    /// Execute one transition's side effects. Returns false when the
    /// transition did not commit (failed activation).
    fn perform_transition(
        &mut self,
        me: &Arc<ManagedComponent>,
        old: ComponentState,
        new: ComponentState,
    ) -> bool {
        match (old, new) {
            (ComponentState::Inactive, ComponentState::Waiting) => {
                self.open_dependencies(me);
                self.commit(me, old, new);
                true
            }
            (ComponentState::Waiting, ComponentState::Active) => {
                if self.activate(me) {
                    self.commit(me, old, new);
                    true
                } else {
                    false
                }
            }
            (ComponentState::Active, ComponentState::Waiting) => {
                self.deactivate(me);
                self.commit(me, old, new);
                true
            }
            (ComponentState::Waiting, ComponentState::Inactive) => {
                self.close_dependencies();
                self.commit(me, old, new);
                true
            }
            _ => {
                error!(component = %me.id, %old, %new, "illegal state transition requested");
                false
            }
        }
    }

    fn commit(&mut self, me: &Arc<ManagedComponent>, old: ComponentState, new: ComponentState) {
        self.state = new;
        info!(component = %me.id, %old, %new, "component state changed");
        for listener in &self.listeners {
            listener.on_state_change(&me.name, old, new);
        }
    }

    fn open_dependencies(&mut self, me: &Arc<ManagedComponent>) {
        for (index, dependency) in self.dependencies.iter_mut().enumerate() {
            let sink = Arc::new(DependencyRoute {
                component: Arc::downgrade(me),
                dep_index: index,
            });
            if let Err(open_error) = dependency.open(sink) {
                error!(
                    component = %me.id,
                    dependency = dependency.name(),
                    %open_error,
                    "failed to open dependency"
                );
                dependency.record_error(&open_error);
            }
        }
    }

    fn close_dependencies(&mut self) {
        for dependency in &mut self.dependencies {
            dependency.close();
        }
    }

    /// Eager resolution, `init`, bind callbacks in declaration order, then
    /// `start`. Any failure unwinds and blocks re-activation until a fresh
    /// event.
    fn activate(&mut self, me: &Arc<ManagedComponent>) -> bool {
        let mut eager = BTreeMap::new();
        for dependency in self
            .dependencies
            .iter_mut()
            .filter(|dependency| dependency.injection() == InjectionMode::Eager)
        {
            match dependency.eager_binding() {
                Ok(Some(binding)) => {
                    eager.insert(dependency.name().to_string(), binding);
                }
                Ok(None) => {}
                Err(eager_error) => {
                    warn!(
                        component = %me.id,
                        dependency = dependency.name(),
                        %eager_error,
                        "eager dependency could not be resolved"
                    );
                    dependency.record_error(&eager_error);
                    self.activation_blocked = true;
                    return false;
                }
            }
        }
        let ctx = ComponentContext::new(me.name.clone(), self.properties.clone(), eager);

        if let Err(callback_error) = self.lifecycle.init(&ctx) {
            self.fail_callback(me, "init", &callback_error);
            self.unwind_activation(me, &[]);
            return false;
        }

        let mut bound_so_far: Vec<(usize, ServiceBinding)> = Vec::new();
        for index in 0..self.dependencies.len() {
            if self.dependencies[index].injection() == InjectionMode::Eager {
                continue;
            }
            let name = self.dependencies[index].name().to_string();
            for change in self.dependencies[index].prime_bindings() {
                let BindingChange::Bind(binding) = change else {
                    continue;
                };
                if let Err(callback_error) = self.lifecycle.bind(&name, &binding) {
                    self.fail_callback(me, &format!("bind[{}]", name), &callback_error);
                    self.dependencies[index].record_error(&Error::callback_failure(
                        me.name.clone(),
                        format!("bind[{}]", name),
                        callback_error.to_string(),
                    ));
                    self.unwind_activation(me, &bound_so_far);
                    return false;
                }
                bound_so_far.push((index, binding));
            }
        }

        if let Err(callback_error) = self.lifecycle.start(&ctx) {
            self.fail_callback(me, "start", &callback_error);
            self.unwind_activation(me, &bound_so_far);
            return false;
        }
        self.context = Some(ctx);
        true
    }

    /// Undo a partial activation: unbind what was bound, in reverse, and
    /// block re-activation until the next event
    fn unwind_activation(&mut self, me: &Arc<ManagedComponent>, bound: &[(usize, ServiceBinding)]) {
        for (index, binding) in bound.iter().rev() {
            let name = self.dependencies[*index].name().to_string();
            if let Err(callback_error) = self.lifecycle.unbind(&name, binding) {
                self.fail_callback(me, &format!("unbind[{}]", name), &callback_error);
            }
        }
        for dependency in &mut self.dependencies {
            dependency.take_bound();
        }
        self.activation_blocked = true;
    }

    /// `stop`, then unbind callbacks in reverse declaration order
    fn deactivate(&mut self, me: &Arc<ManagedComponent>) {
        let ctx = self.take_context(me);
        if let Err(callback_error) = self.lifecycle.stop(&ctx) {
            self.fail_callback(me, "stop", &callback_error);
        }
        for index in (0..self.dependencies.len()).rev() {
            let name = self.dependencies[index].name().to_string();
            let bound = self.dependencies[index].take_bound();
            if self.dependencies[index].injection() == InjectionMode::Eager {
                continue;
            }
            for binding in bound.into_iter().rev() {
                if let Err(callback_error) = self.lifecycle.unbind(&name, &binding) {
                    self.fail_callback(me, &format!("unbind[{}]", name), &callback_error);
                }
            }
        }
    }

    fn take_context(&mut self, me: &Arc<ManagedComponent>) -> ComponentContext {
        self.context.take().unwrap_or_else(|| {
            ComponentContext::new(me.name.clone(), self.properties.clone(), BTreeMap::new())
        })
    }

    /// Fold one dependency's recomputation into the component state
    fn apply_outcome(
        &mut self,
        me: &Arc<ManagedComponent>,
        dep_index: usize,
        outcome: RecomputeOutcome,
    ) {
        if self.state != ComponentState::Active {
            self.handle_change(me);
            return;
        }

        let gating = self.dependencies[dep_index].gates_satisfaction();
        if gating && !outcome.satisfied {
            // Required dependency lost: stop runs first, then every bound
            // provider is unbound; the departed providers are released last.
            self.handle_change(me);
            let name = self.dependencies[dep_index].name().to_string();
            for change in outcome.changes {
                if let BindingChange::Unbind(binding) = change {
                    if let Err(callback_error) = self.lifecycle.unbind(&name, &binding) {
                        self.fail_callback(me, &format!("unbind[{}]", name), &callback_error);
                    }
                }
            }
            return;
        }

        if outcome.eager_stale {
            // A constructor-injected provider changed; the instance can only
            // pick up the replacement through a restart.
            info!(
                component = %me.id,
                dependency = self.dependencies[dep_index].name(),
                "eagerly injected provider replaced; restarting component"
            );
            self.deactivate(me);
            self.commit(me, ComponentState::Active, ComponentState::Waiting);
            self.handle_change(me);
            return;
        }

        let name = self.dependencies[dep_index].name().to_string();
        for change in outcome.changes {
            let result = match &change {
                BindingChange::Bind(binding) => self.lifecycle.bind(&name, binding),
                BindingChange::Unbind(binding) => self.lifecycle.unbind(&name, binding),
                BindingChange::Swap { old, new } => self.lifecycle.swap(&name, old, new),
            };
            if let Err(callback_error) = result {
                self.fail_callback(me, &format!("rebind[{}]", name), &callback_error);
                self.dependencies[dep_index].record_error(&Error::callback_failure(
                    me.name.clone(),
                    format!("rebind[{}]", name),
                    callback_error.to_string(),
                ));
                self.force_revert(me);
                return;
            }
        }
        self.handle_change(me);
    }

    /// Callback failure while active: revert to waiting and hold there
    /// until a fresh event
    fn force_revert(&mut self, me: &Arc<ManagedComponent>) {
        if self.state == ComponentState::Active {
            self.deactivate(me);
            self.commit(me, ComponentState::Active, ComponentState::Waiting);
        }
        self.activation_blocked = true;
    }

    fn destroy(&mut self, me: &Arc<ManagedComponent>) {
        if self.state == ComponentState::Destroyed {
            return;
        }
        if self.state == ComponentState::Active {
            self.deactivate(me);
            self.commit(me, ComponentState::Active, ComponentState::Waiting);
        }
        if self.state == ComponentState::Waiting {
            self.close_dependencies();
        }
        let ctx = self.take_context(me);
        if let Err(callback_error) = self.lifecycle.destroy(&ctx) {
            self.fail_callback(me, "destroy", &callback_error);
        }
        let old = self.state;
        self.commit(me, old, ComponentState::Destroyed);
        // Nothing queued behind the destroy may fire.
        me.gate.close();
    }

    fn fail_callback(&mut self, me: &Arc<ManagedComponent>, phase: &str, cause: &Error) {
        let failure = Error::callback_failure(me.name.clone(), phase, cause.to_string());
        error!(component = %me.id, %failure, "lifecycle callback failed");
        self.last_error = Some(failure.to_string());
    }
}

fn describe_core(id: &str, name: &str, core: &ComponentCore) -> ComponentDescription {
    ComponentDescription {
        id: id.to_string(),
        name: name.to_string(),
        state: core.state,
        enabled: core.enabled,
        properties: core.properties.clone(),
        dependencies: core
            .dependencies
            .iter()
            .map(DependencyTracker::describe)
            .collect(),
        last_error: core.last_error.clone(),
        captured_at: Utc::now(),
    }
}
