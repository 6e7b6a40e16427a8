//! Registry of classes declared as service interfaces
//!
//! The set and every check built on it only exist with the `diagnostics`
//! feature. Without it `is_interface` is always false,
//! `nearest_interface_ancestor` always `None`, and declarations are accepted
//! and discarded, so interface misuse goes undetected in stripped builds.

use crate::container::identity::ServiceClass;
use crate::errors::RegistryError;
use crate::foundation::traits::Service;

#[cfg(feature = "diagnostics")]
use std::collections::HashSet;
#[cfg(feature = "diagnostics")]
use std::sync::RwLock;

/// Set of classes declared as contracts
#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    #[cfg(feature = "diagnostics")]
    interfaces: RwLock<HashSet<ServiceClass>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `T` as a service interface
    pub fn declare<T: Service>(&self) -> Result<(), RegistryError> {
        self.declare_class(ServiceClass::of::<T>())
    }

    /// Declare a class as a service interface. A class that already
    /// implements another interface cannot become one itself.
    #[cfg(feature = "diagnostics")]
    pub fn declare_class(&self, class: ServiceClass) -> Result<(), RegistryError> {
        if let Some(interface) = self.nearest_interface_ancestor(class) {
            return Err(RegistryError::InvalidDeclaration {
                class: class.display_name(),
                interface: interface.display_name(),
            });
        }

        let mut interfaces = self
            .interfaces
            .write()
            .map_err(|_| RegistryError::lock("service_interfaces"))?;
        interfaces.insert(class);

        tracing::debug!(service = %class, "Declared service interface");
        Ok(())
    }

    #[cfg(not(feature = "diagnostics"))]
    pub fn declare_class(&self, class: ServiceClass) -> Result<(), RegistryError> {
        tracing::trace!(service = %class, "Interface declaration ignored without diagnostics");
        Ok(())
    }

    /// Whether the class itself was declared; ancestors do not count
    #[cfg(feature = "diagnostics")]
    pub fn is_interface(&self, class: ServiceClass) -> bool {
        self.interfaces
            .read()
            .map(|interfaces| interfaces.contains(&class))
            .unwrap_or(false)
    }

    #[cfg(not(feature = "diagnostics"))]
    pub fn is_interface(&self, _class: ServiceClass) -> bool {
        false
    }

    /// First declared interface among the class's ancestors, starting at its
    /// immediate parent
    #[cfg(feature = "diagnostics")]
    pub fn nearest_interface_ancestor(&self, class: ServiceClass) -> Option<ServiceClass> {
        let interfaces = self.interfaces.read().ok()?;
        let found = class.ancestors().find(|ancestor| interfaces.contains(ancestor));

        tracing::trace!(
            service = %class,
            interface = ?found.map(|c| c.display_name()),
            "Walked ancestor chain"
        );
        found
    }

    #[cfg(not(feature = "diagnostics"))]
    pub fn nearest_interface_ancestor(&self, _class: ServiceClass) -> Option<ServiceClass> {
        None
    }

    /// Number of declared interfaces
    #[cfg(feature = "diagnostics")]
    pub fn len(&self) -> usize {
        self.interfaces
            .read()
            .map(|interfaces| interfaces.len())
            .unwrap_or(0)
    }

    #[cfg(not(feature = "diagnostics"))]
    pub fn len(&self) -> usize {
        0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
