use crate::container::identity::ServiceClass;
use crate::container::owner::ServiceOwner;
use crate::container::store::ServiceContainer;
use crate::errors::RegistryError;
use crate::foundation::traits::Service;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

/// Lazily resolved injection point for a consumer field
///
/// The first successful [`get`](Inject::get) resolves `T` through the owner
/// and memoizes the result; later calls return the same `Arc` without
/// touching the owner. An injection point belongs to the first owner it is
/// read through, and reading it through any other owner fails with
/// [`RegistryError::ForeignOwner`].
pub struct Inject<T: Service> {
    resolved: OnceLock<(u64, Arc<T::View>)>,
    _service: PhantomData<fn() -> T>,
}

impl<T: Service> Inject<T> {
    pub const fn new() -> Self {
        Self {
            resolved: OnceLock::new(),
            _service: PhantomData,
        }
    }

    pub fn get<C: ServiceContainer>(
        &self,
        owner: &ServiceOwner<C>,
    ) -> Result<Arc<T::View>, RegistryError> {
        let (resolved_by, view) = match self.resolved.get() {
            Some(resolved) => resolved,
            None => {
                let view = owner.inject::<T>()?;
                self.resolved.get_or_init(|| (owner.id(), view))
            }
        };

        if *resolved_by != owner.id() {
            return Err(RegistryError::ForeignOwner {
                class: ServiceClass::of::<T>().display_name(),
                resolved_by: *resolved_by,
                requested_by: owner.id(),
            });
        }
        Ok(view.clone())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Id of the owner this injection point was resolved through
    pub fn owner_id(&self) -> Option<u64> {
        self.resolved.get().map(|(id, _)| *id)
    }
}

impl<T: Service> Default for Inject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Service> std::fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inject")
            .field("service", &std::any::type_name::<T>())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::interfaces::InterfaceRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

    trait Counter: Send + Sync {
        fn id(&self) -> usize;
    }

    impl std::fmt::Debug for dyn Counter {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_tuple("Counter").field(&self.id()).finish()
        }
    }

    struct CountingService {
        id: usize,
    }

    impl Default for CountingService {
        fn default() -> Self {
            Self {
                id: CONSTRUCTED.fetch_add(1, Ordering::SeqCst),
            }
        }
    }

    impl Counter for CountingService {
        fn id(&self) -> usize {
            self.id
        }
    }

    crate::service!(CountingService => dyn Counter);

    #[derive(Default)]
    struct Consumer {
        first: Inject<CountingService>,
        second: Inject<CountingService>,
    }

    #[test]
    fn test_fields_share_the_owner_singleton() {
        let owner = ServiceOwner::new(Arc::new(InterfaceRegistry::new()));
        let consumer = Consumer::default();

        assert!(!consumer.first.is_resolved());
        let a = consumer.first.get(&owner).unwrap();
        let b = consumer.second.get(&owner).unwrap();
        let again = consumer.first.get(&owner).unwrap();

        assert!(consumer.first.is_resolved());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_owners_do_not_share_singletons() {
        let interfaces = Arc::new(InterfaceRegistry::new());
        let one = ServiceOwner::new(interfaces.clone());
        let two = ServiceOwner::new(interfaces);

        let a = Inject::<CountingService>::new().get(&one).unwrap();
        let b = Inject::<CountingService>::new().get(&two).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_reading_through_another_owner_fails() {
        let interfaces = Arc::new(InterfaceRegistry::new());
        let one = ServiceOwner::new(interfaces.clone());
        let two = ServiceOwner::new(interfaces);
        let field = Inject::<CountingService>::new();

        let first = field.get(&one).unwrap();
        assert_eq!(field.owner_id(), Some(one.id()));

        let err = field.get(&two).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::ForeignOwner { resolved_by, requested_by, .. }
                if resolved_by == one.id() && requested_by == two.id()
        ));
        assert!(Arc::ptr_eq(&first, &field.get(&one).unwrap()));
    }
}
