//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Patchbay engine
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed capability registration, rejected at the registry boundary
    #[error("Invalid registration: {message}")]
    InvalidRegistration {
        /// Description of what made the registration invalid
        message: String,
    },

    /// Stale provider handle; benign when racing a concurrent removal
    #[error("Unknown handle: {capability}#{registration_id}")]
    UnknownHandle {
        /// Capability type the handle was registered under
        capability: String,
        /// Registration id of the stale handle
        registration_id: u64,
    },

    /// Malformed filter expression
    #[error("Filter syntax error in `{filter}`: {message}")]
    FilterSyntax {
        /// The offending filter text
        filter: String,
        /// Description of the syntax problem
        message: String,
    },

    /// A lifecycle or bind/unbind callback failed
    #[error("Callback `{phase}` failed for component `{component}`: {message}")]
    CallbackFailure {
        /// The component whose callback failed
        component: String,
        /// The lifecycle phase or bind identity that failed
        phase: String,
        /// Failure description reported by the callback
        message: String,
    },

    /// An interceptor failed and was skipped for the recomputation
    #[error("Interceptor `{name}` failed: {message}")]
    Interceptor {
        /// Name the interceptor was registered under
        name: String,
        /// Failure description
        message: String,
    },

    /// Invalid component or dependency declaration
    #[error("Invalid declaration: {message}")]
    Declaration {
        /// Description of the declaration problem
        message: String,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No component registered under the given id
    #[error("Component not found: {id}")]
    ComponentNotFound {
        /// The unknown component id
        id: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl Error {
    /// Create an invalid registration error
    pub fn invalid_registration<S: Into<String>>(message: S) -> Self {
        Self::InvalidRegistration {
            message: message.into(),
        }
    }

    /// Create an unknown handle error
    pub fn unknown_handle<S: Into<String>>(capability: S, registration_id: u64) -> Self {
        Self::UnknownHandle {
            capability: capability.into(),
            registration_id,
        }
    }

    /// Create a filter syntax error
    pub fn filter_syntax<F: Into<String>, S: Into<String>>(filter: F, message: S) -> Self {
        Self::FilterSyntax {
            filter: filter.into(),
            message: message.into(),
        }
    }

    /// Create a callback failure error
    pub fn callback_failure<C: Into<String>, P: Into<String>, S: Into<String>>(
        component: C,
        phase: P,
        message: S,
    ) -> Self {
        Self::CallbackFailure {
            component: component.into(),
            phase: phase.into(),
            message: message.into(),
        }
    }

    /// Create an interceptor error
    pub fn interceptor<N: Into<String>, S: Into<String>>(name: N, message: S) -> Self {
        Self::Interceptor {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a declaration error
    pub fn declaration<S: Into<String>>(message: S) -> Self {
        Self::Declaration {
            message: message.into(),
        }
    }

    /// Create a configuration error (simple)
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a component not found error
    pub fn component_not_found<S: Into<String>>(id: S) -> Self {
        Self::ComponentNotFound { id: id.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Declaration {
            message: errors.to_string(),
        }
    }
}
