//! Typed service-override registry
//!
//! Sits in front of a string-keyed singleton container and adds collision-free
//! keys per service class, declared service interfaces, and validated
//! overrides of a default implementation with a subclass.
//!
//! ```rust
//! use std::sync::Arc;
//! use typed_services_core::{service, InterfaceRegistry, ServiceOwner};
//!
//! trait Shape: Send + Sync {
//!     fn name(&self) -> &'static str;
//! }
//!
//! #[derive(Default)]
//! struct ShapeService;
//! impl Shape for ShapeService {
//!     fn name(&self) -> &'static str { "shape" }
//! }
//!
//! #[derive(Default)]
//! struct Circle;
//! impl Shape for Circle {
//!     fn name(&self) -> &'static str { "circle" }
//! }
//!
//! service!(ShapeService => dyn Shape);
//! service!(Circle: ShapeService => dyn Shape);
//!
//! let interfaces = Arc::new(InterfaceRegistry::new());
//! interfaces.declare::<ShapeService>()?;
//!
//! let owner = ServiceOwner::new(interfaces);
//! owner.override_interface::<ShapeService, Circle>()?;
//!
//! assert_eq!(owner.inject::<ShapeService>()?.name(), "circle");
//! # Ok::<(), typed_services_core::RegistryError>(())
//! ```
//!
//! With the default `diagnostics` feature every misuse is reported as a
//! [`RegistryError`]. Building without it compiles the interface set and the
//! override checks out; the registry then binds whatever it is asked to.

pub mod config;
pub mod container;
pub mod errors;
pub mod foundation;

pub use config::{ConfigError, ConfigSource, Environment, RegistryConfig, RegistryConfigTrait};
pub use container::{
    Binding, BindingOrigin, Inject, InterfaceRegistry, LookupKey, OverrideMode, OwnerSnapshot,
    ServiceClass, ServiceContainer, ServiceOwner, SingletonContainer,
};
pub use errors::RegistryError;
pub use foundation::Service;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Whether override diagnostics are compiled in
pub const fn diagnostics_enabled() -> bool {
    cfg!(feature = "diagnostics")
}
