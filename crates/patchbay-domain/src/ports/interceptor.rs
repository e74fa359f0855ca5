//! Resolution interceptors
//!
//! Interceptors plug into a dependency's candidate computation. Tracking
//! interceptors accept, reject, or transform individual candidates; ranking
//! interceptors reorder or narrow the accepted set. Both must be pure with
//! respect to the registry: same input, same output, no registrations from
//! inside an interceptor. A failing interceptor is skipped for that
//! recomputation and logged.

use crate::constants::{
    DEPENDENCY_CAPABILITY_PROPERTY, DEPENDENCY_COMPONENT_PROPERTY, DEPENDENCY_NAME_PROPERTY,
};
use crate::error::Result;
use crate::value_objects::{ProviderHandle, ServiceProperties};

/// Identity of the dependency being recomputed, visible to interceptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    /// Owning component's declared name
    pub component: String,
    /// The dependency's declared name
    pub dependency: String,
    /// Capability type the dependency tracks
    pub capability: String,
}

impl DependencyInfo {
    /// Property view of this metadata, matched against interceptor target
    /// filters
    pub fn as_properties(&self) -> ServiceProperties {
        ServiceProperties::new()
            .with(DEPENDENCY_COMPONENT_PROPERTY, self.component.as_str())
            .with(DEPENDENCY_NAME_PROPERTY, self.dependency.as_str())
            .with(DEPENDENCY_CAPABILITY_PROPERTY, self.capability.as_str())
    }
}

/// Per-candidate accept/reject/transform hook
pub trait TrackingInterceptor: Send + Sync {
    /// Decide on one candidate. `Ok(None)` vetoes it; `Ok(Some(view))`
    /// passes a (possibly property-decorated) view to the next interceptor.
    fn accept(
        &self,
        dependency: &DependencyInfo,
        candidate: &ProviderHandle,
    ) -> Result<Option<ProviderHandle>>;
}

/// Matching-set reorder/selection hook
pub trait RankingInterceptor: Send + Sync {
    /// Return the subset of `matching`, in binding order. The default
    /// registry order (ranking descending, registration id ascending) is
    /// what a dependency uses when no ranking interceptor applies.
    fn rank(
        &self,
        dependency: &DependencyInfo,
        matching: &[ProviderHandle],
    ) -> Result<Vec<ProviderHandle>>;
}
