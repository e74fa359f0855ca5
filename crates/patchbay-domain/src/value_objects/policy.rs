//! Dependency binding policy

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a dependency reacts to better candidates appearing while bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingPolicy {
    /// Bind once; while the component is active only the loss of a bound
    /// provider triggers re-resolution
    Static,
    /// Always track the best match, rebinding (and swapping for singular
    /// dependencies) whenever the selection changes
    #[default]
    Dynamic,
}

impl fmt::Display for BindingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingPolicy::Static => f.write_str("static"),
            BindingPolicy::Dynamic => f.write_str("dynamic"),
        }
    }
}
