//! Runtime layer for Patchbay
//!
//! The live engine behind the domain contracts: a process-wide service
//! registry with sequence-ordered change notification, per-component
//! serializing gates, dependency trackers that fold interceptor chains over
//! the candidate set, context sources for indirect filters, and the
//! component state machine that turns aggregate satisfaction into lifecycle
//! callbacks.
//!
//! Entry point is [`engine::Engine`]; everything else hangs off it.

pub mod component;
pub mod config;
pub mod context;
pub mod dependency;
pub mod engine;
pub mod gate;
pub mod interceptors;
pub mod locks;
pub mod logging;
pub mod registry;

pub use config::{ConfigLoader, EngineConfig, GateConfig, LoggingConfig};
pub use context::{ContextSourceHandle, ContextSourceRegistry};
pub use engine::Engine;
pub use gate::Gate;
pub use interceptors::{InterceptorHandle, InterceptorRegistry};
pub use registry::ServiceRegistry;
