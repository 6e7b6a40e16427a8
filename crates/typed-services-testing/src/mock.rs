//! Mock registration
//!
//! Unlike an override, a mock may be any class that converts into the same
//! view as the service it replaces: it need not descend from it, the service
//! need not be an interface, and nothing is recorded in the used set.

use crate::TestResult;
use typed_services_core::{Service, ServiceContainer, ServiceOwner};

/// Replace `Base` with `Mock` on the owner, skipping override validation
pub fn register_mock<Base, Mock, C>(owner: &ServiceOwner<C>) -> TestResult<()>
where
    Base: Service,
    Mock: Service<View = Base::View>,
    C: ServiceContainer,
{
    owner.replace_binding::<Base, Mock>()?;
    tracing::debug!(
        service = std::any::type_name::<Base>(),
        mock = std::any::type_name::<Mock>(),
        "Registered mock service"
    );
    Ok(())
}
