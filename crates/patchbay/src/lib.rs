//! # Patchbay
//!
//! A dynamic dependency resolution and component lifecycle engine.
//!
//! Components declare requirements on *capability types*; providers of
//! those capabilities appear, disappear, and change at arbitrary times
//! while the process runs. Patchbay continuously decides whether each
//! component is satisfied, selects among candidate providers per policy,
//! drives lifecycle callbacks exactly once per transition, and lets
//! pluggable interceptors filter or re-rank the visible candidate set.
//!
//! ## Example
//!
//! ```ignore
//! use patchbay::{Engine, ComponentDeclaration, DependencyDeclaration};
//!
//! let engine = Engine::new();
//! let id = engine.declare(
//!     ComponentDeclaration::new("greeter")
//!         .with_dependency(DependencyDeclaration::new("sink", "log.sink")),
//!     Box::new(Greeter::default()),
//! )?;
//! engine.enable(&id)?;
//! // registering a `log.sink` provider now activates the component
//! # Ok::<(), patchbay::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - `domain` - value objects, filters, declarations, events, port traits
//! - `runtime` - registry, gates, dependency tracking, state machine,
//!   configuration and logging

/// Domain layer - core types and port traits
///
/// Re-exports from the domain crate for convenience
pub mod domain {
    pub use patchbay_domain::*;
}

/// Runtime layer - the engine and its collaborators
///
/// Re-exports from the runtime crate for convenience
pub mod runtime {
    pub use patchbay_runtime::*;
}

// Re-export commonly used domain types at the crate root
pub use domain::*;

// Re-export the engine entry point and runtime handles at the crate root
pub use runtime::{
    ConfigLoader, ContextSourceHandle, Engine, EngineConfig, InterceptorHandle,
};
