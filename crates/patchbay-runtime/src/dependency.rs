//! Dependency tracking and provider selection
//!
//! A [`DependencyTracker`] owns the resolution pipeline for one declared
//! requirement: raw candidates from the registry, the matching set after
//! filter and tracking-interceptor evaluation, the selected set after
//! ranking and cardinality truncation, and the bindings currently handed to
//! the component. Invariant: selected ⊆ matching ⊆ candidates (by
//! registration id).
//!
//! All methods run on the owning component's gate; the tracker itself needs
//! no locking.

use std::sync::Arc;

use tracing::{debug, warn};

use patchbay_domain::declaration::{DependencyDeclaration, InjectionMode};
use patchbay_domain::error::{Error, Result};
use patchbay_domain::events::ServiceEvent;
use patchbay_domain::filter::{Filter, FilterTemplate, Resolution};
use patchbay_domain::introspection::{DependencyDescription, ProviderSummary};
use patchbay_domain::ports::interceptor::DependencyInfo;
use patchbay_domain::ports::lifecycle::ServiceBinding;
use patchbay_domain::value_objects::{
    BindingPolicy, DependencyState, ProviderHandle, ServiceProperties,
};

use crate::context::ContextSourceRegistry;
use crate::interceptors::InterceptorRegistry;
use crate::registry::{EventSink, ServiceRegistry, SubscriptionId};

/// One change to the bound set, to be delivered as a callback
pub(crate) enum BindingChange {
    Bind(ServiceBinding),
    Unbind(ServiceBinding),
    Swap {
        old: ServiceBinding,
        new: ServiceBinding,
    },
}

/// Result of a recomputation, consumed by the component state machine
pub(crate) struct RecomputeOutcome {
    pub was_satisfied: bool,
    pub satisfied: bool,
    /// Bound-set changes; only populated while the component is active
    pub changes: Vec<BindingChange>,
    /// An eagerly injected provider is gone from the selection; the
    /// component must reactivate to pick up a replacement
    pub eager_stale: bool,
}

enum FilterState {
    Invalid,
    Unresolved,
    Ready(Option<Filter>),
}

/// Live resolution state for one dependency declaration
pub(crate) struct DependencyTracker {
    declaration: DependencyDeclaration,
    info: DependencyInfo,
    meta_properties: ServiceProperties,
    template: Option<FilterTemplate>,
    template_error: Option<String>,
    registry: Arc<ServiceRegistry>,
    interceptors: Arc<InterceptorRegistry>,
    contexts: Arc<ContextSourceRegistry>,
    subscription: Option<SubscriptionId>,
    /// All live providers of the capability, registration order
    candidates: Vec<ProviderHandle>,
    /// Concrete filter currently in effect, if resolved
    effective: Option<Filter>,
    matching: Vec<ProviderHandle>,
    selected: Vec<ProviderHandle>,
    bound: Vec<ServiceBinding>,
    /// Registration id handed out through the component context, for eager
    /// injection
    eager_bound: Option<u64>,
    state: DependencyState,
    last_error: Option<String>,
}

impl DependencyTracker {
    pub(crate) fn new(
        component: &str,
        declaration: DependencyDeclaration,
        registry: Arc<ServiceRegistry>,
        interceptors: Arc<InterceptorRegistry>,
        contexts: Arc<ContextSourceRegistry>,
    ) -> Self {
        let info = DependencyInfo {
            component: component.to_string(),
            dependency: declaration.name.clone(),
            capability: declaration.capability.clone(),
        };
        let meta_properties = info.as_properties();
        let (template, template_error) = match &declaration.filter {
            Some(text) => match FilterTemplate::parse(text.as_str()) {
                Ok(template) => (Some(template), None),
                Err(error) => {
                    warn!(
                        component,
                        dependency = %declaration.name,
                        %error,
                        "dependency filter does not parse; dependency can never be satisfied"
                    );
                    (None, Some(error.to_string()))
                }
            },
            None => (None, None),
        };
        Self {
            declaration,
            info,
            meta_properties,
            template,
            template_error,
            registry,
            interceptors,
            contexts,
            subscription: None,
            candidates: Vec::new(),
            effective: None,
            matching: Vec::new(),
            selected: Vec::new(),
            bound: Vec::new(),
            eager_bound: None,
            state: DependencyState::Unsatisfied,
            last_error: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.declaration.name
    }

    pub(crate) fn injection(&self) -> InjectionMode {
        self.declaration.injection
    }

    pub(crate) fn gates_satisfaction(&self) -> bool {
        self.declaration.gates_satisfaction()
    }

    pub(crate) fn is_satisfied(&self) -> bool {
        self.state.is_satisfied()
    }

    /// Subscribe to the registry and compute the initial sets synchronously,
    /// so the component can read satisfaction deterministically on return
    pub(crate) fn open(&mut self, sink: Arc<dyn EventSink>) -> Result<()> {
        let (subscription, snapshot) =
            self.registry.subscribe(&self.declaration.capability, sink)?;
        self.subscription = Some(subscription);
        self.candidates = snapshot;
        self.recompute(false);
        Ok(())
    }

    /// Unsubscribe and forget all tracked state
    pub(crate) fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            if let Err(error) = self
                .registry
                .unsubscribe(&self.declaration.capability, subscription)
            {
                warn!(dependency = %self.declaration.name, %error, "unsubscribe failed");
            }
        }
        self.candidates.clear();
        self.matching.clear();
        self.selected.clear();
        self.bound.clear();
        self.eager_bound = None;
        self.effective = None;
        self.state = DependencyState::Unsatisfied;
    }

    /// Apply one registry event and recompute
    pub(crate) fn on_event(&mut self, event: &ServiceEvent, active: bool) -> RecomputeOutcome {
        match event {
            ServiceEvent::Added(handle) => self.candidates.push(handle.clone()),
            ServiceEvent::Removed(handle) => self
                .candidates
                .retain(|candidate| candidate.registration_id() != handle.registration_id()),
            ServiceEvent::Changed { new, .. } => {
                match self
                    .candidates
                    .iter_mut()
                    .find(|candidate| candidate.same_registration(new))
                {
                    Some(candidate) => *candidate = new.clone(),
                    None => self.candidates.push(new.clone()),
                }
            }
            ServiceEvent::Swapped { .. } => {
                debug!(dependency = %self.declaration.name, "ignoring swap event from registry");
            }
        }
        self.recompute(active)
    }

    /// Recompute matching, selection, satisfaction, and (while active) the
    /// bound set
    pub(crate) fn recompute(&mut self, active: bool) -> RecomputeOutcome {
        let was_satisfied = self.state.is_satisfied();
        match self.resolve_filter() {
            FilterState::Invalid => {
                self.matching.clear();
                self.selected.clear();
                self.state = DependencyState::InvalidFilter;
            }
            FilterState::Unresolved => {
                self.matching.clear();
                self.selected.clear();
                self.state = DependencyState::UnresolvedContext;
            }
            FilterState::Ready(filter) => {
                self.compute_matching(filter.as_ref());
                self.compute_selection();
                self.state = if !self.declaration.cardinality.requires_provider()
                    || !self.selected.is_empty()
                {
                    DependencyState::Satisfied
                } else {
                    DependencyState::Unsatisfied
                };
            }
        }
        let changes = if active {
            self.update_bindings()
        } else {
            Vec::new()
        };
        let eager_stale = self.eager_bound.is_some_and(|id| {
            !self
                .selected
                .iter()
                .any(|handle| handle.registration_id() == id)
        });
        RecomputeOutcome {
            was_satisfied,
            satisfied: self.state.is_satisfied(),
            changes,
            eager_stale,
        }
    }

    fn resolve_filter(&mut self) -> FilterState {
        if self.template_error.is_some() {
            self.effective = None;
            self.last_error = self.template_error.clone();
            return FilterState::Invalid;
        }
        let Some(template) = &self.template else {
            self.effective = None;
            return FilterState::Ready(None);
        };
        let bindings = self.contexts.bindings_for(&template.placeholders());
        match template.resolve(&bindings) {
            Ok(Resolution::Concrete(filter)) => {
                self.effective = Some(filter.clone());
                FilterState::Ready(Some(filter))
            }
            Ok(Resolution::Unresolved(missing)) => {
                debug!(
                    dependency = %self.declaration.name,
                    missing = ?missing.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "filter placeholders unresolved"
                );
                self.effective = None;
                FilterState::Unresolved
            }
            Err(error) => {
                self.effective = None;
                self.last_error = Some(error.to_string());
                FilterState::Invalid
            }
        }
    }

    fn compute_matching(&mut self, filter: Option<&Filter>) {
        let chain = self.interceptors.tracking_chain(&self.meta_properties);
        let mut matching = Vec::new();
        'candidates: for candidate in &self.candidates {
            if let Some(filter) = filter {
                if !filter.matches(candidate.properties()) {
                    continue;
                }
            }
            let mut view = candidate.clone();
            for (name, interceptor) in &chain {
                match interceptor.accept(&self.info, &view) {
                    Ok(Some(transformed)) => {
                        if transformed.same_registration(&view) {
                            view = transformed;
                        } else {
                            warn!(
                                dependency = %self.declaration.name,
                                interceptor = %name,
                                "tracking interceptor changed candidate identity; ignoring transform"
                            );
                        }
                    }
                    Ok(None) => continue 'candidates,
                    Err(error) => {
                        warn!(
                            dependency = %self.declaration.name,
                            interceptor = %name,
                            %error,
                            "tracking interceptor failed; treating as identity"
                        );
                        self.last_error =
                            Some(Error::interceptor(name, error.to_string()).to_string());
                    }
                }
            }
            matching.push(view);
        }
        matching.sort_by(ProviderHandle::registry_cmp);
        self.matching = matching;
    }

    fn compute_selection(&mut self) {
        let mut ranked = self.matching.clone();
        let chain = self.interceptors.ranking_chain(&self.meta_properties);
        for (name, interceptor) in &chain {
            match interceptor.rank(&self.info, &ranked) {
                Ok(list) => {
                    // Selection must stay inside the matching set.
                    ranked = list
                        .into_iter()
                        .filter(|handle| {
                            self.matching
                                .iter()
                                .any(|candidate| candidate.same_registration(handle))
                        })
                        .collect();
                }
                Err(error) => {
                    warn!(
                        dependency = %self.declaration.name,
                        interceptor = %name,
                        %error,
                        "ranking interceptor failed; keeping previous order"
                    );
                    self.last_error =
                        Some(Error::interceptor(name, error.to_string()).to_string());
                }
            }
        }
        if let Some(limit) = self.declaration.cardinality.limit() {
            ranked.truncate(limit);
        }
        self.selected = ranked;
    }

    /// Reconcile the bound set with the current selection, per policy
    fn update_bindings(&mut self) -> Vec<BindingChange> {
        if self.declaration.injection == InjectionMode::Eager {
            // Eager providers reach the component through the context at
            // activation; there are no per-provider callbacks to emit.
            return Vec::new();
        }
        match self.declaration.policy {
            BindingPolicy::Static => {
                let lost = self.bound.iter().any(|binding| {
                    !self
                        .matching
                        .iter()
                        .any(|handle| handle.same_registration(binding.handle()))
                });
                if lost {
                    // A bound provider is gone; re-resolve from the full
                    // matching set.
                    self.refresh_bindings()
                } else {
                    // Better candidates do not unseat a live static binding.
                    self.refresh_bound_views();
                    Vec::new()
                }
            }
            BindingPolicy::Dynamic => self.refresh_bindings(),
        }
    }

    fn refresh_bindings(&mut self) -> Vec<BindingChange> {
        let mut changes = Vec::new();
        if !self.declaration.cardinality.is_multiple() {
            let target = self.selected.first().cloned();
            let current = self.bound.first().cloned();
            match (current, target) {
                (None, None) => {}
                (None, Some(handle)) => {
                    if let Some(binding) = self.make_binding(&handle) {
                        self.bound = vec![binding.clone()];
                        changes.push(BindingChange::Bind(binding));
                    }
                }
                (Some(old), None) => {
                    self.bound.clear();
                    changes.push(BindingChange::Unbind(old));
                }
                (Some(old), Some(handle)) => {
                    if old.handle().same_registration(&handle) {
                        if old.handle() != &handle {
                            self.bound = vec![ServiceBinding::new(handle, old.instance())];
                        }
                    } else {
                        match self.make_binding(&handle) {
                            Some(new) => {
                                self.bound = vec![new.clone()];
                                changes.push(BindingChange::Swap { old, new });
                            }
                            None => {
                                self.bound.clear();
                                changes.push(BindingChange::Unbind(old));
                            }
                        }
                    }
                }
            }
        } else {
            for binding in &self.bound {
                let still_selected = self
                    .selected
                    .iter()
                    .any(|handle| handle.same_registration(binding.handle()));
                if !still_selected {
                    changes.push(BindingChange::Unbind(binding.clone()));
                }
            }
            let mut new_bound = Vec::with_capacity(self.selected.len());
            for handle in &self.selected {
                if let Some(existing) = self
                    .bound
                    .iter()
                    .find(|binding| binding.handle().same_registration(handle))
                {
                    let refreshed = if existing.handle() == handle {
                        existing.clone()
                    } else {
                        ServiceBinding::new(handle.clone(), existing.instance())
                    };
                    new_bound.push(refreshed);
                } else if let Some(binding) = self.make_binding(handle) {
                    changes.push(BindingChange::Bind(binding.clone()));
                    new_bound.push(binding);
                }
            }
            self.bound = new_bound;
        }
        changes
    }

    /// Refresh the property views of bound handles without rebinding
    fn refresh_bound_views(&mut self) {
        for binding in &mut self.bound {
            if let Some(handle) = self
                .matching
                .iter()
                .find(|candidate| candidate.same_registration(binding.handle()))
            {
                if binding.handle() != handle {
                    *binding = ServiceBinding::new(handle.clone(), binding.instance());
                }
            }
        }
    }

    fn make_binding(&self, handle: &ProviderHandle) -> Option<ServiceBinding> {
        match self.registry.get_instance(handle) {
            Ok(instance) => Some(ServiceBinding::new(handle.clone(), instance)),
            Err(error) => {
                // The provider raced a removal; its Removed event is queued
                // right behind this recomputation.
                debug!(
                    dependency = %self.declaration.name,
                    provider = %handle,
                    %error,
                    "provider vanished before binding"
                );
                None
            }
        }
    }

    /// First selected provider as an eagerly injected binding, recorded so
    /// staleness can be detected later. `None` when the (optional)
    /// dependency has no selection.
    pub(crate) fn eager_binding(&mut self) -> Result<Option<ServiceBinding>> {
        let Some(handle) = self.selected.first().cloned() else {
            self.eager_bound = None;
            return Ok(None);
        };
        let instance = self.registry.get_instance(&handle)?;
        self.eager_bound = Some(handle.registration_id());
        Ok(Some(ServiceBinding::new(handle, instance)))
    }

    /// Activation-time bind changes: the bound set is primed from the
    /// current selection
    pub(crate) fn prime_bindings(&mut self) -> Vec<BindingChange> {
        self.bound.clear();
        self.refresh_bindings()
    }

    /// Drain the bound set for deactivation; callers unbind in reverse
    pub(crate) fn take_bound(&mut self) -> Vec<ServiceBinding> {
        self.eager_bound = None;
        std::mem::take(&mut self.bound)
    }

    pub(crate) fn record_error(&mut self, error: &Error) {
        self.last_error = Some(error.to_string());
    }

    pub(crate) fn references_source(&self, source: &str) -> bool {
        self.template
            .as_ref()
            .map(|template| {
                template
                    .placeholders()
                    .iter()
                    .any(|placeholder| placeholder.source == source)
            })
            .unwrap_or(false)
    }

    pub(crate) fn in_scope(&self, scope: &crate::component::InvalidationScope) -> bool {
        use crate::component::InvalidationScope;
        match scope {
            InvalidationScope::All => true,
            InvalidationScope::Target(filter) => filter.matches(&self.meta_properties),
            InvalidationScope::Source(source) => self.references_source(source),
        }
    }

    /// Replace the filter template at runtime and leave the caller to
    /// recompute
    pub(crate) fn set_filter(&mut self, filter: Option<String>) -> Result<()> {
        match filter {
            Some(text) => {
                let template = FilterTemplate::parse(text.as_str())?;
                self.template = Some(template);
            }
            None => self.template = None,
        }
        self.declaration.filter = self
            .template
            .as_ref()
            .map(|template| template.raw().to_string());
        self.template_error = None;
        self.last_error = None;
        Ok(())
    }

    /// Snapshot for introspection
    pub(crate) fn describe(&self) -> DependencyDescription {
        let mut bound: Vec<ProviderSummary> =
            self.bound.iter().map(|b| b.handle().into()).collect();
        if let Some(id) = self.eager_bound {
            if let Some(handle) = self
                .selected
                .iter()
                .find(|handle| handle.registration_id() == id)
            {
                bound.push(handle.into());
            }
        }
        DependencyDescription {
            name: self.declaration.name.clone(),
            capability: self.declaration.capability.clone(),
            declared_filter: self.declaration.filter.clone(),
            effective_filter: self.effective.as_ref().map(ToString::to_string),
            cardinality: self.declaration.cardinality,
            policy: self.declaration.policy,
            required: self.declaration.gates_satisfaction(),
            state: self.state,
            matching: self.matching.iter().map(Into::into).collect(),
            selected: self.selected.iter().map(Into::into).collect(),
            bound,
            last_error: self.last_error.clone(),
        }
    }
}
