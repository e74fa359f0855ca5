//! Component and dependency declarations
//!
//! Declarations are the metadata input of the engine. They arrive from an
//! external scanner or are built programmatically with the builder methods
//! here, and are validated once when the component is declared.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result};
use crate::value_objects::{BindingPolicy, Cardinality, ServiceProperties};

/// How a dependency's providers reach the component instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionMode {
    /// Delivered through `bind`/`unbind` callbacks as providers come and go
    #[default]
    Callback,
    /// Resolved before `init` runs and handed over via the component
    /// context; treated as required regardless of declared cardinality
    Eager,
}

/// Declaration of one requirement on providers of a capability type
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DependencyDeclaration {
    /// Bind identity, passed to the component's callbacks
    #[validate(length(min = 1))]
    pub name: String,

    /// Capability type to track
    #[validate(length(min = 1))]
    pub capability: String,

    /// Optional filter template, possibly with `${source.key}` placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// How many providers to bind
    #[serde(default)]
    pub cardinality: Cardinality,

    /// Reaction to better candidates while bound
    #[serde(default)]
    pub policy: BindingPolicy,

    /// Whether component satisfaction depends on this dependency
    #[serde(default = "default_required")]
    pub required: bool,

    /// Callback or eager injection
    #[serde(default)]
    pub injection: InjectionMode,
}

fn default_required() -> bool {
    true
}

impl DependencyDeclaration {
    /// Create a callback-injected, required, `1..1`, dynamic declaration
    pub fn new<N: Into<String>, C: Into<String>>(name: N, capability: C) -> Self {
        Self {
            name: name.into(),
            capability: capability.into(),
            filter: None,
            cardinality: Cardinality::default(),
            policy: BindingPolicy::default(),
            required: true,
            injection: InjectionMode::default(),
        }
    }

    /// Set the filter template
    pub fn with_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set the cardinality
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Set the binding policy
    pub fn with_policy(mut self, policy: BindingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Mark the dependency as optional for component satisfaction
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Resolve eagerly before `init` instead of through callbacks
    pub fn eager(mut self) -> Self {
        self.injection = InjectionMode::Eager;
        self
    }

    /// Whether this dependency gates component satisfaction
    ///
    /// Eager dependencies are always treated as required.
    pub fn gates_satisfaction(&self) -> bool {
        self.required || self.injection == InjectionMode::Eager
    }
}

/// Declaration of a managed component
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ComponentDeclaration {
    /// Implementation identity of the component
    #[validate(length(min = 1))]
    pub name: String,

    /// Properties attached to the component
    #[serde(default)]
    pub properties: ServiceProperties,

    /// Dependency declarations in bind order
    #[validate(nested)]
    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,
}

impl ComponentDeclaration {
    /// Create a declaration with no dependencies
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            properties: ServiceProperties::new(),
            dependencies: Vec::new(),
        }
    }

    /// Attach a component property
    pub fn with_property<K: Into<String>, V: Into<crate::value_objects::PropertyValue>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Append a dependency declaration
    pub fn with_dependency(mut self, dependency: DependencyDeclaration) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Validate field constraints plus dependency-name uniqueness
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        let mut seen = std::collections::BTreeSet::new();
        for dependency in &self.dependencies {
            if !seen.insert(dependency.name.as_str()) {
                return Err(Error::declaration(format!(
                    "duplicate dependency name `{}` in component `{}`",
                    dependency.name, self.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let declaration = ComponentDeclaration::new("logger")
            .with_dependency(DependencyDeclaration::new("sink", "log.sink"));
        assert!(declaration.check().is_ok());
        let dependency = &declaration.dependencies[0];
        assert_eq!(dependency.cardinality, Cardinality::ExactlyOne);
        assert_eq!(dependency.policy, BindingPolicy::Dynamic);
        assert!(dependency.required);
        assert_eq!(dependency.injection, InjectionMode::Callback);
    }

    #[test]
    fn test_empty_names_rejected() {
        assert!(ComponentDeclaration::new("").check().is_err());
        let declaration = ComponentDeclaration::new("logger")
            .with_dependency(DependencyDeclaration::new("", "log.sink"));
        assert!(declaration.check().is_err());
    }

    #[test]
    fn test_duplicate_dependency_names_rejected() {
        let declaration = ComponentDeclaration::new("logger")
            .with_dependency(DependencyDeclaration::new("sink", "log.sink"))
            .with_dependency(DependencyDeclaration::new("sink", "log.format"));
        assert!(declaration.check().is_err());
    }

    #[test]
    fn test_eager_dependencies_gate_satisfaction() {
        let optional_eager = DependencyDeclaration::new("db", "database")
            .optional()
            .eager();
        assert!(optional_eager.gates_satisfaction());
        let optional = DependencyDeclaration::new("db", "database").optional();
        assert!(!optional.gates_satisfaction());
    }
}
