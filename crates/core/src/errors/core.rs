use crate::config::ConfigError;
use thiserror::Error;

/// Core error type for the service registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("You attempted to declare {class} as a service interface, but it is an implementation of the {interface} service interface")]
    InvalidDeclaration { class: String, interface: String },

    #[error("{class} isn't a service interface. Classes you override through an interface must be declared with `declare_interface`; implementations can then be registered in place of the interface")]
    NotAnInterface { class: String },

    #[error("{class} isn't a subclass of {base}. Overrides must be strict descendants of the service they replace")]
    NotASubclass { class: String, base: String },

    #[error("{class} cannot override itself. Resolve it directly instead of registering it as its own override")]
    SelfRegistration { class: String },

    #[error("{class} is already bound on this owner. A class may implement at most one service per owner")]
    AlreadyUsed { class: String },

    #[error("You attempted to inject {class}, but it is an implementation of the {interface} service interface. Inject {interface} instead")]
    InjectedImplementationDirectly { class: String, interface: String },

    #[error("Cannot override {service} with {implementation}: {service} was already resolved on this owner. Register overrides before the first lookup")]
    OverrideAfterResolution {
        service: String,
        implementation: String,
    },

    #[error("Lookup key collision on '{key}': already bound for {existing}, requested for {requested}")]
    KeyCollision {
        key: String,
        existing: String,
        requested: String,
    },

    #[error("Injection point for {class} was resolved through owner {resolved_by} and cannot be read through owner {requested_by}")]
    ForeignOwner {
        class: String,
        resolved_by: u64,
        requested_by: u64,
    },

    #[error("Instance stored under '{key}' is not a {expected}")]
    ViewMismatch { key: String, expected: String },

    #[error("Service not found: {service_type}")]
    ServiceNotFound { service_type: String },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl RegistryError {
    /// Create a new service not found error
    pub fn service_not_found(service_type: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            service_type: service_type.into(),
        }
    }

    /// Create a lock error for a named resource
    pub fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Whether the error comes from one of the override checks
    pub fn is_override_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotAnInterface { .. }
                | Self::NotASubclass { .. }
                | Self::SelfRegistration { .. }
                | Self::AlreadyUsed { .. }
                | Self::OverrideAfterResolution { .. }
        )
    }

    /// Whether the error is an interface/implementation ambiguity
    pub fn is_interface_misuse(&self) -> bool {
        matches!(
            self,
            Self::InvalidDeclaration { .. } | Self::InjectedImplementationDirectly { .. }
        )
    }

    /// Whether the error was caused by internal state rather than misuse
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::LockError { .. } | Self::ServiceNotFound { .. } | Self::ViewMismatch { .. }
        )
    }
}
