//! Interceptor registration and invalidation
//!
//! Interceptors register with a property dictionary; its `patchbay.target`
//! filter (if any) restricts which dependencies consult them, matched
//! against the dependency's metadata properties. Tracking interceptors run
//! in registration order; ranking interceptors fold over the matching set in
//! registration order with the registry's own ordering as the identity.
//!
//! Registration, removal, and explicit `invalidate()` all push a
//! recomputation onto every in-scope component's gate; this is the only
//! externally triggered recomputation path besides registry events and
//! context changes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use patchbay_domain::constants::TARGET_PROPERTY;
use patchbay_domain::error::Result;
use patchbay_domain::filter::Filter;
use patchbay_domain::ports::interceptor::{RankingInterceptor, TrackingInterceptor};
use patchbay_domain::value_objects::ServiceProperties;

use crate::component::{ComponentIndex, InvalidationScope};
use crate::locks::{lock_rwlock_read, lock_rwlock_write};

struct TrackingEntry {
    id: u64,
    name: String,
    target: Option<Filter>,
    interceptor: Arc<dyn TrackingInterceptor>,
}

struct RankingEntry {
    id: u64,
    name: String,
    target: Option<Filter>,
    interceptor: Arc<dyn RankingInterceptor>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InterceptorKind {
    Tracking,
    Ranking,
}

/// Registry of resolution interceptors
pub struct InterceptorRegistry {
    components: Arc<ComponentIndex>,
    tracking: RwLock<Vec<TrackingEntry>>,
    ranking: RwLock<Vec<RankingEntry>>,
    next_id: AtomicU64,
}

impl InterceptorRegistry {
    pub(crate) fn new(components: Arc<ComponentIndex>) -> Self {
        Self {
            components,
            tracking: RwLock::new(Vec::new()),
            ranking: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a tracking interceptor; in-scope dependencies recompute
    /// before this returns
    pub fn add_tracking(
        self: &Arc<Self>,
        name: &str,
        properties: &ServiceProperties,
        interceptor: Arc<dyn TrackingInterceptor>,
    ) -> Result<InterceptorHandle> {
        let target = parse_target(properties)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let scope = scope_of(&target);
        {
            let mut entries = lock_rwlock_write(&self.tracking, "InterceptorRegistry::add_tracking")?;
            entries.push(TrackingEntry {
                id,
                name: name.to_string(),
                target,
                interceptor,
            });
        }
        info!(interceptor = name, kind = "tracking", "interceptor registered");
        self.broadcast(scope);
        Ok(InterceptorHandle {
            registry: Arc::clone(self),
            kind: InterceptorKind::Tracking,
            id,
            name: name.to_string(),
        })
    }

    /// Register a ranking interceptor; in-scope dependencies recompute
    /// before this returns
    pub fn add_ranking(
        self: &Arc<Self>,
        name: &str,
        properties: &ServiceProperties,
        interceptor: Arc<dyn RankingInterceptor>,
    ) -> Result<InterceptorHandle> {
        let target = parse_target(properties)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let scope = scope_of(&target);
        {
            let mut entries = lock_rwlock_write(&self.ranking, "InterceptorRegistry::add_ranking")?;
            entries.push(RankingEntry {
                id,
                name: name.to_string(),
                target,
                interceptor,
            });
        }
        info!(interceptor = name, kind = "ranking", "interceptor registered");
        self.broadcast(scope);
        Ok(InterceptorHandle {
            registry: Arc::clone(self),
            kind: InterceptorKind::Ranking,
            id,
            name: name.to_string(),
        })
    }

    /// Tracking interceptors applying to a dependency, in registration order
    pub(crate) fn tracking_chain(
        &self,
        dependency_properties: &ServiceProperties,
    ) -> Vec<(String, Arc<dyn TrackingInterceptor>)> {
        match lock_rwlock_read(&self.tracking, "InterceptorRegistry::tracking_chain") {
            Ok(entries) => entries
                .iter()
                .filter(|entry| applies(&entry.target, dependency_properties))
                .map(|entry| (entry.name.clone(), Arc::clone(&entry.interceptor)))
                .collect(),
            Err(error) => {
                warn!(%error, "tracking chain unavailable");
                Vec::new()
            }
        }
    }

    /// Ranking interceptors applying to a dependency, in registration order
    pub(crate) fn ranking_chain(
        &self,
        dependency_properties: &ServiceProperties,
    ) -> Vec<(String, Arc<dyn RankingInterceptor>)> {
        match lock_rwlock_read(&self.ranking, "InterceptorRegistry::ranking_chain") {
            Ok(entries) => entries
                .iter()
                .filter(|entry| applies(&entry.target, dependency_properties))
                .map(|entry| (entry.name.clone(), Arc::clone(&entry.interceptor)))
                .collect(),
            Err(error) => {
                warn!(%error, "ranking chain unavailable");
                Vec::new()
            }
        }
    }

    fn scope_for(&self, kind: InterceptorKind, id: u64) -> Option<InvalidationScope> {
        match kind {
            InterceptorKind::Tracking => {
                let entries = lock_rwlock_read(&self.tracking, "InterceptorRegistry::scope_for").ok()?;
                entries
                    .iter()
                    .find(|entry| entry.id == id)
                    .map(|entry| scope_of(&entry.target))
            }
            InterceptorKind::Ranking => {
                let entries = lock_rwlock_read(&self.ranking, "InterceptorRegistry::scope_for").ok()?;
                entries
                    .iter()
                    .find(|entry| entry.id == id)
                    .map(|entry| scope_of(&entry.target))
            }
        }
    }

    fn remove(&self, kind: InterceptorKind, id: u64) -> Option<InvalidationScope> {
        let scope = self.scope_for(kind, id);
        match kind {
            InterceptorKind::Tracking => {
                if let Ok(mut entries) =
                    lock_rwlock_write(&self.tracking, "InterceptorRegistry::remove")
                {
                    entries.retain(|entry| entry.id != id);
                }
            }
            InterceptorKind::Ranking => {
                if let Ok(mut entries) =
                    lock_rwlock_write(&self.ranking, "InterceptorRegistry::remove")
                {
                    entries.retain(|entry| entry.id != id);
                }
            }
        }
        scope
    }

    /// Push a recomputation onto every in-scope component's gate and drain
    fn broadcast(&self, scope: InvalidationScope) {
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
}

fn parse_target(properties: &ServiceProperties) -> Result<Option<Filter>> {
    match properties.get_str(TARGET_PROPERTY) {
        Some(text) => Ok(Some(Filter::parse(text)?)),
        None => Ok(None),
    }
}

fn scope_of(target: &Option<Filter>) -> InvalidationScope {
    match target {
        Some(filter) => InvalidationScope::Target(filter.clone()),
        None => InvalidationScope::All,
    }
}

fn applies(target: &Option<Filter>, dependency_properties: &ServiceProperties) -> bool {
    target
        .as_ref()
        .map(|filter| filter.matches(dependency_properties))
        .unwrap_or(true)
}

/// Owner-side handle to a registered interceptor
pub struct InterceptorHandle {
    registry: Arc<InterceptorRegistry>,
    kind: InterceptorKind,
    id: u64,
    name: String,
}

impl InterceptorHandle {
    /// Name the interceptor was registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Force every dependency this interceptor applies to to recompute its
    /// matching and selected sets immediately
    pub fn invalidate(&self) {
        if let Some(scope) = self.registry.scope_for(self.kind, self.id) {
            info!(interceptor = %self.name, "interceptor invalidation requested");
            self.registry.broadcast(scope);
        }
    }

    /// Withdraw the interceptor; in-scope dependencies recompute without it
    pub fn remove(self) {
        if let Some(scope) = self.registry.remove(self.kind, self.id) {
            info!(interceptor = %self.name, "interceptor removed");
            self.registry.broadcast(scope);
        }
    }
}
