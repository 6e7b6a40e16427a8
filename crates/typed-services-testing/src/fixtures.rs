//! Per-test owner fixture

use std::ops::Deref;
use std::sync::Arc;

use crate::mock::register_mock;
use crate::TestResult;
use typed_services_core::{InterfaceRegistry, RegistryConfig, Service, ServiceOwner};

/// A fresh owner configured with the testing preset
///
/// Each test gets its own owner so singletons and used classes never leak
/// between tests. Dereferences to [`ServiceOwner`].
pub struct TestOwner {
    owner: ServiceOwner,
}

impl TestOwner {
    /// Owner with its own empty interface registry
    pub fn new() -> Self {
        Self::with_interfaces(Arc::new(InterfaceRegistry::new()))
    }

    /// Owner sharing an application's interface registry
    pub fn with_interfaces(interfaces: Arc<InterfaceRegistry>) -> Self {
        Self::with_config(interfaces, RegistryConfig::testing())
    }

    pub fn with_config(interfaces: Arc<InterfaceRegistry>, config: RegistryConfig) -> Self {
        crate::logging::init_test_logging();
        Self {
            owner: ServiceOwner::with_config(interfaces, config),
        }
    }

    /// Declare `T` as an interface on the owner's registry
    pub fn declare<T: Service>(self) -> TestResult<Self> {
        self.owner.interfaces().declare::<T>()?;
        Ok(self)
    }

    /// Replace `Base` with `Mock`; see [`register_mock`]
    pub fn mock<Base, Mock>(&self) -> TestResult<&Self>
    where
        Base: Service,
        Mock: Service<View = Base::View>,
    {
        register_mock::<Base, Mock, _>(&self.owner)?;
        Ok(self)
    }

    pub fn owner(&self) -> &ServiceOwner {
        &self.owner
    }

    /// Text report of the owner's bindings
    pub fn report(&self) -> TestResult<String> {
        Ok(self.owner.snapshot()?.render())
    }

    /// JSON dump of the owner's bindings
    pub fn report_json(&self) -> TestResult<String> {
        Ok(self.owner.snapshot()?.to_json()?)
    }
}

impl Default for TestOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestOwner {
    type Target = ServiceOwner;

    fn deref(&self) -> &ServiceOwner {
        &self.owner
    }
}
