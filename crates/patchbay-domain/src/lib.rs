//! Domain layer for Patchbay
//!
//! Pure types and contracts for the dynamic component wiring engine: provider
//! handles and their property dictionaries, filter expressions with context
//! placeholders, component and dependency declarations, service change
//! events, introspection DTOs, and the port traits implemented by component
//! code (lifecycle callbacks) and by plugins (interceptors, state listeners).
//!
//! This crate contains no engine machinery and no I/O. The runtime lives in
//! `patchbay-runtime`.

pub mod constants;
pub mod declaration;
pub mod error;
pub mod events;
pub mod filter;
pub mod introspection;
pub mod ports;
pub mod value_objects;

pub use declaration::{ComponentDeclaration, DependencyDeclaration, InjectionMode};
pub use error::{Error, Result};
pub use events::{SequencedEvent, ServiceEvent};
pub use filter::{ContextBindings, Filter, FilterTemplate, Placeholder, Resolution};
pub use introspection::{ComponentDescription, DependencyDescription, ProviderSummary};
pub use ports::interceptor::{DependencyInfo, RankingInterceptor, TrackingInterceptor};
pub use ports::lifecycle::{ComponentContext, ComponentLifecycle, ServiceBinding};
pub use ports::state_listener::ComponentStateListener;
pub use value_objects::{
    BindingPolicy, Cardinality, ComponentState, DependencyState, PropertyValue, ProviderHandle,
    ServiceProperties,
};
