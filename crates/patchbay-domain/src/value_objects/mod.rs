//! Value objects for the component wiring domain

pub mod cardinality;
pub mod handle;
pub mod policy;
pub mod properties;
pub mod state;

pub use cardinality::Cardinality;
pub use handle::ProviderHandle;
pub use policy::BindingPolicy;
pub use properties::{PropertyValue, ServiceProperties};
pub use state::{ComponentState, DependencyState};
