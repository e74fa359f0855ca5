//! Well-known property keys and defaults

/// Property carrying a provider's ranking. Higher ranks are preferred.
/// Providers without this property rank at [`DEFAULT_RANKING`].
pub const RANKING_PROPERTY: &str = "patchbay.ranking";

/// Ranking assumed for providers that do not declare [`RANKING_PROPERTY`].
pub const DEFAULT_RANKING: i64 = 0;

/// Property on an interceptor registration restricting which dependencies
/// consult it. The value is a filter matched against the dependency metadata
/// properties below.
pub const TARGET_PROPERTY: &str = "patchbay.target";

/// Dependency metadata property: the capability type the dependency tracks.
pub const DEPENDENCY_CAPABILITY_PROPERTY: &str = "patchbay.capability";

/// Dependency metadata property: the owning component's name.
pub const DEPENDENCY_COMPONENT_PROPERTY: &str = "patchbay.component";

/// Dependency metadata property: the dependency's declared name.
pub const DEPENDENCY_NAME_PROPERTY: &str = "patchbay.dependency";
