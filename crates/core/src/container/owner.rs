//! Owner-scoped bindings, overrides and the service accessor
//!
//! A [`ServiceOwner`] wraps one underlying container and owns the two tables
//! that make overriding safe: the bindings written through it and the set of
//! classes already committed to a binding. Both go away with the owner.
//!
//! Overrides must be registered before the first read of the service they
//! replace. What happens to a late override depends on
//! [`RegistryConfig::strict_ordering`]: it is rejected with
//! [`RegistryError::OverrideAfterResolution`], or it replaces the binding and
//! readers that already hold the old singleton keep it.

use crate::config::RegistryConfig;
use crate::container::identity::{LookupKey, ServiceClass};
use crate::container::interfaces::InterfaceRegistry;
use crate::container::store::{ServiceContainer, ServiceFactory, ServiceInstance, SingletonContainer};
use crate::errors::RegistryError;
use crate::foundation::traits::Service;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// How an override relates to the service it replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OverrideMode {
    /// The base is a declared interface and the override descends from it
    InterfaceMediated,
    /// The base is any service and the override is a strict subclass not
    /// already bound elsewhere on the owner
    DirectSubclass,
}

/// Where a binding came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BindingOrigin {
    /// Bound implicitly by the first read
    Default,
    /// Written by an explicit override
    Override(OverrideMode),
    /// Written by test support, bypassing validation
    Mock,
}

/// One entry of the owner's binding table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The class whose key this binding occupies
    pub service: ServiceClass,
    /// The class the container instantiates for it
    pub implementation: ServiceClass,
    pub origin: BindingOrigin,
    /// Whether a consumer has read the singleton
    pub resolved: bool,
}

fn factory_for<S: Service>() -> ServiceFactory {
    Arc::new(|| {
        let view: Arc<S::View> = S::into_view(Arc::new(S::default()));
        Arc::new(view) as ServiceInstance
    })
}

type BindingTable = HashMap<LookupKey, Binding>;

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// DI owner: a container plus the override bookkeeping scoped to it
///
/// Every operation that reads and then writes the binding table holds the
/// table's write lock for its whole duration. Lock order is bindings, then
/// used set, then the container's own lock.
pub struct ServiceOwner<C: ServiceContainer = SingletonContainer> {
    id: u64,
    container: C,
    interfaces: Arc<InterfaceRegistry>,
    config: RegistryConfig,
    bindings: RwLock<BindingTable>,
    used: RwLock<HashSet<ServiceClass>>,
}

impl ServiceOwner<SingletonContainer> {
    /// Owner backed by a fresh in-memory container
    pub fn new(interfaces: Arc<InterfaceRegistry>) -> Self {
        Self::with_config(interfaces, RegistryConfig::default())
    }

    pub fn with_config(interfaces: Arc<InterfaceRegistry>, config: RegistryConfig) -> Self {
        Self::with_container(SingletonContainer::new(), interfaces, config)
    }
}

impl<C: ServiceContainer> ServiceOwner<C> {
    /// Owner in front of an existing container
    pub fn with_container(
        container: C,
        interfaces: Arc<InterfaceRegistry>,
        config: RegistryConfig,
    ) -> Self {
        let id = NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(owner = id, environment = %config.environment, "Creating service owner");
        Self {
            id,
            container,
            interfaces,
            config,
            bindings: RwLock::new(HashMap::new()),
            used: RwLock::new(HashSet::new()),
        }
    }

    /// Process-unique identifier of this owner
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn interfaces(&self) -> &Arc<InterfaceRegistry> {
        &self.interfaces
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Resolve the singleton for `T`, binding `T` as its own implementation
    /// on first read if nothing was registered for it.
    ///
    /// With diagnostics enabled, injecting a class that implements a
    /// declared interface fails: consumers must inject the interface.
    pub fn inject<T: Service>(&self) -> Result<Arc<T::View>, RegistryError> {
        let class = ServiceClass::of::<T>();

        if let Some(interface) = self.interfaces.nearest_interface_ancestor(class) {
            return Err(RegistryError::InjectedImplementationDirectly {
                class: class.display_name(),
                interface: interface.display_name(),
            });
        }

        let key = class.lookup_key();
        let instance = {
            let mut bindings = self.write_bindings()?;
            ensure_key_owned_by(&bindings, &key, class)?;

            if !bindings.contains_key(&key) && !self.container.contains(&key) {
                self.insert_default(&mut bindings, class, factory_for::<T>())?;
            }

            let instance = self
                .container
                .lookup(&key)?
                .ok_or_else(|| RegistryError::service_not_found(class.type_name()))?;
            mark_resolved(&mut bindings, &key);
            instance
        };

        downcast_view::<T::View>(&key, instance)
    }

    /// The singleton for `T` if something is already registered for it.
    /// Never registers a default.
    pub fn lookup<T: Service>(&self) -> Result<Option<Arc<T::View>>, RegistryError> {
        let class = ServiceClass::of::<T>();
        let key = class.lookup_key();

        let instance = {
            let mut bindings = self.write_bindings()?;
            ensure_key_owned_by(&bindings, &key, class)?;

            let instance = self.container.lookup(&key)?;
            if instance.is_some() {
                mark_resolved(&mut bindings, &key);
            }
            instance
        };

        instance
            .map(|instance| downcast_view::<T::View>(&key, instance))
            .transpose()
    }

    /// Bind `T` under its own key and mark it used. An existing binding for
    /// the key is left untouched so earlier overrides keep winning.
    pub fn bind_default<T: Service>(&self) -> Result<(), RegistryError> {
        let class = ServiceClass::of::<T>();
        let key = class.lookup_key();
        let mut bindings = self.write_bindings()?;

        if bindings.contains_key(&key) {
            tracing::trace!(service = %class, "Default binding skipped, key already bound");
            return Ok(());
        }

        self.insert_default(&mut bindings, class, factory_for::<T>())
    }

    /// Register `Sub` in place of `Base` on this owner
    pub fn override_service<Base, Sub>(&self, mode: OverrideMode) -> Result<(), RegistryError>
    where
        Base: Service,
        Sub: Service<View = Base::View>,
    {
        let base = ServiceClass::of::<Base>();
        let sub = ServiceClass::of::<Sub>();
        let key = base.lookup_key();

        let mut bindings = self.write_bindings()?;
        ensure_key_owned_by(&bindings, &key, base)?;

        #[cfg(feature = "diagnostics")]
        self.validate_override(base, sub, mode)?;

        if bindings.get(&key).is_some_and(|existing| existing.resolved) {
            if self.config.strict_ordering {
                return Err(RegistryError::OverrideAfterResolution {
                    service: base.display_name(),
                    implementation: sub.display_name(),
                });
            }
            tracing::warn!(
                service = %base,
                implementation = %sub,
                "Overriding a service that was already resolved; existing readers keep the old instance"
            );
        }

        self.insert_binding(
            &mut bindings,
            base,
            sub,
            BindingOrigin::Override(mode),
            factory_for::<Sub>(),
        )?;

        let tracks_usage = match mode {
            OverrideMode::DirectSubclass => true,
            OverrideMode::InterfaceMediated => self.config.track_interface_usage,
        };
        if tracks_usage {
            self.mark_used(&[base, sub])?;
        }

        tracing::debug!(
            service = %base,
            implementation = %sub,
            mode = ?mode,
            "Registered service override"
        );
        Ok(())
    }

    /// Shorthand for an interface-mediated override
    pub fn override_interface<Base, Sub>(&self) -> Result<(), RegistryError>
    where
        Base: Service,
        Sub: Service<View = Base::View>,
    {
        self.override_service::<Base, Sub>(OverrideMode::InterfaceMediated)
    }

    /// Shorthand for a direct-subclass override
    pub fn override_subclass<Base, Sub>(&self) -> Result<(), RegistryError>
    where
        Base: Service,
        Sub: Service<View = Base::View>,
    {
        self.override_service::<Base, Sub>(OverrideMode::DirectSubclass)
    }

    /// Replace `Base`'s binding with `Impl` without any validation or used
    /// tracking. This exists for test support; application code should use
    /// [`override_service`](Self::override_service).
    pub fn replace_binding<Base, Impl>(&self) -> Result<(), RegistryError>
    where
        Base: Service,
        Impl: Service<View = Base::View>,
    {
        let base = ServiceClass::of::<Base>();
        let implementation = ServiceClass::of::<Impl>();

        let mut bindings = self.write_bindings()?;
        ensure_key_owned_by(&bindings, &base.lookup_key(), base)?;
        self.insert_binding(
            &mut bindings,
            base,
            implementation,
            BindingOrigin::Mock,
            factory_for::<Impl>(),
        )?;

        tracing::warn!(
            service = %base,
            implementation = %implementation,
            "Replaced binding without validation"
        );
        Ok(())
    }

    /// The implementation currently bound for a class, if any
    pub fn resolve(&self, class: ServiceClass) -> Result<Option<ServiceClass>, RegistryError> {
        let bindings = self.read_bindings()?;
        Ok(bindings
            .get(&class.lookup_key())
            .filter(|binding| binding.service == class)
            .map(|binding| binding.implementation))
    }

    /// Whether a class is committed to a binding on this owner
    pub fn is_used(&self, class: ServiceClass) -> Result<bool, RegistryError> {
        let used = self
            .used
            .read()
            .map_err(|_| RegistryError::lock("owner_used"))?;
        Ok(used.contains(&class))
    }

    /// All bindings, ordered by key
    pub fn bindings(&self) -> Result<Vec<(LookupKey, Binding)>, RegistryError> {
        let bindings = self.read_bindings()?;
        let mut entries: Vec<_> = bindings
            .iter()
            .map(|(key, binding)| (key.clone(), binding.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// Classes committed to a binding, in no particular order
    pub fn used_classes(&self) -> Result<Vec<ServiceClass>, RegistryError> {
        let used = self
            .used
            .read()
            .map_err(|_| RegistryError::lock("owner_used"))?;
        Ok(used.iter().copied().collect())
    }

    #[cfg(feature = "diagnostics")]
    fn validate_override(
        &self,
        base: ServiceClass,
        sub: ServiceClass,
        mode: OverrideMode,
    ) -> Result<(), RegistryError> {
        match mode {
            OverrideMode::InterfaceMediated => {
                if !self.interfaces.is_interface(base) {
                    return Err(RegistryError::NotAnInterface {
                        class: base.display_name(),
                    });
                }
                ensure_subclass(base, sub)?;
                if self.config.track_interface_usage {
                    self.ensure_unused(sub)?;
                }
            }
            OverrideMode::DirectSubclass => {
                if sub == base {
                    return Err(RegistryError::SelfRegistration {
                        class: base.display_name(),
                    });
                }
                ensure_subclass(base, sub)?;
                self.ensure_unused(sub)?;
            }
        }
        Ok(())
    }

    #[cfg(feature = "diagnostics")]
    fn ensure_unused(&self, class: ServiceClass) -> Result<(), RegistryError> {
        if self.is_used(class)? {
            Err(RegistryError::AlreadyUsed {
                class: class.display_name(),
            })
        } else {
            Ok(())
        }
    }

    fn read_bindings(&self) -> Result<RwLockReadGuard<'_, BindingTable>, RegistryError> {
        self.bindings
            .read()
            .map_err(|_| RegistryError::lock("owner_bindings"))
    }

    fn write_bindings(&self) -> Result<RwLockWriteGuard<'_, BindingTable>, RegistryError> {
        self.bindings
            .write()
            .map_err(|_| RegistryError::lock("owner_bindings"))
    }

    fn insert_default(
        &self,
        bindings: &mut BindingTable,
        class: ServiceClass,
        factory: ServiceFactory,
    ) -> Result<(), RegistryError> {
        self.insert_binding(bindings, class, class, BindingOrigin::Default, factory)?;
        self.mark_used(&[class])?;

        tracing::debug!(service = %class, key = %class.lookup_key(), "Bound default implementation");
        Ok(())
    }

    /// Register the factory with the container and record the binding. The
    /// caller holds the bindings write lock and has checked key ownership.
    fn insert_binding(
        &self,
        bindings: &mut BindingTable,
        service: ServiceClass,
        implementation: ServiceClass,
        origin: BindingOrigin,
        factory: ServiceFactory,
    ) -> Result<(), RegistryError> {
        let key = service.lookup_key();
        self.container.register(&key, factory)?;
        bindings.insert(
            key,
            Binding {
                service,
                implementation,
                origin,
                resolved: false,
            },
        );
        Ok(())
    }

    fn mark_used(&self, classes: &[ServiceClass]) -> Result<(), RegistryError> {
        let mut used = self
            .used
            .write()
            .map_err(|_| RegistryError::lock("owner_used"))?;
        used.extend(classes.iter().copied());
        Ok(())
    }
}

#[cfg(feature = "diagnostics")]
fn ensure_subclass(base: ServiceClass, sub: ServiceClass) -> Result<(), RegistryError> {
    if sub.is_strict_descendant_of(&base) {
        Ok(())
    } else {
        Err(RegistryError::NotASubclass {
            class: sub.display_name(),
            base: base.display_name(),
        })
    }
}

/// Two classes with the same display name share a key; only the first one
/// bound on an owner may use it.
fn ensure_key_owned_by(
    bindings: &BindingTable,
    key: &LookupKey,
    class: ServiceClass,
) -> Result<(), RegistryError> {
    match bindings.get(key) {
        Some(binding) if binding.service != class => Err(RegistryError::KeyCollision {
            key: key.to_string(),
            existing: binding.service.type_name().to_string(),
            requested: class.type_name().to_string(),
        }),
        _ => Ok(()),
    }
}

fn mark_resolved(bindings: &mut BindingTable, key: &LookupKey) {
    if let Some(binding) = bindings.get_mut(key) {
        binding.resolved = true;
    }
}

impl<C: ServiceContainer + std::fmt::Debug> std::fmt::Debug for ServiceOwner<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let binding_count = self.bindings.read().map(|b| b.len()).unwrap_or(0);
        f.debug_struct("ServiceOwner")
            .field("container", &self.container)
            .field("bindings", &binding_count)
            .field("config", &self.config)
            .finish()
    }
}

fn downcast_view<V: ?Sized + Send + Sync + 'static>(
    key: &LookupKey,
    instance: ServiceInstance,
) -> Result<Arc<V>, RegistryError> {
    instance
        .downcast_ref::<Arc<V>>()
        .cloned()
        .ok_or_else(|| RegistryError::ViewMismatch {
            key: key.to_string(),
            expected: std::any::type_name::<V>().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Store: Send + Sync {
        fn backend(&self) -> &'static str;
    }

    impl std::fmt::Debug for dyn Store {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_tuple("Store").field(&self.backend()).finish()
        }
    }

    #[derive(Default)]
    struct MemoryStore;
    impl Store for MemoryStore {
        fn backend(&self) -> &'static str {
            "memory"
        }
    }

    #[derive(Default)]
    struct DiskStore;
    impl Store for DiskStore {
        fn backend(&self) -> &'static str {
            "disk"
        }
    }

    crate::service!(MemoryStore => dyn Store);
    crate::service!(DiskStore: MemoryStore => dyn Store);

    fn owner() -> ServiceOwner {
        ServiceOwner::new(Arc::new(InterfaceRegistry::new()))
    }

    #[test]
    fn test_bind_default_keeps_existing_override() {
        let owner = owner();
        owner.override_subclass::<MemoryStore, DiskStore>().unwrap();
        owner.bind_default::<MemoryStore>().unwrap();

        assert_eq!(owner.inject::<MemoryStore>().unwrap().backend(), "disk");
        let bindings = owner.bindings().unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(
            bindings[0].1.origin,
            BindingOrigin::Override(OverrideMode::DirectSubclass)
        );
    }

    #[test]
    fn test_first_read_marks_binding_resolved() {
        let owner = owner();
        owner.bind_default::<MemoryStore>().unwrap();
        assert!(!owner.bindings().unwrap()[0].1.resolved);

        owner.inject::<MemoryStore>().unwrap();
        assert!(owner.bindings().unwrap()[0].1.resolved);
    }

    #[test]
    fn test_foreign_instance_is_a_view_mismatch() {
        let container = SingletonContainer::new();
        let key = ServiceClass::of::<MemoryStore>().lookup_key();
        container
            .register(&key, Arc::new(|| Arc::new(42_u32) as ServiceInstance))
            .unwrap();

        let owner = ServiceOwner::with_container(
            container,
            Arc::new(InterfaceRegistry::new()),
            RegistryConfig::default(),
        );

        let err = owner.inject::<MemoryStore>().unwrap_err();
        assert!(matches!(err, RegistryError::ViewMismatch { .. }));
    }

    #[test]
    fn test_resolve_unbound_class() {
        let owner = owner();
        assert_eq!(owner.resolve(ServiceClass::of::<MemoryStore>()).unwrap(), None);
        assert!(!owner.is_used(ServiceClass::of::<MemoryStore>()).unwrap());
    }

    struct SlowStore;

    impl Default for SlowStore {
        fn default() -> Self {
            std::thread::sleep(std::time::Duration::from_micros(50));
            Self
        }
    }

    impl Store for SlowStore {
        fn backend(&self) -> &'static str {
            "slow"
        }
    }

    crate::service!(SlowStore => dyn Store);

    #[test]
    fn test_concurrent_first_reads_share_one_singleton() {
        use std::sync::Barrier;
        use std::thread;

        const THREADS: usize = 8;

        for _ in 0..200 {
            let owner = Arc::new(owner());
            let barrier = Arc::new(Barrier::new(THREADS));

            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let owner = Arc::clone(&owner);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        owner.inject::<SlowStore>().unwrap()
                    })
                })
                .collect();

            let instances: Vec<_> = handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect();

            assert!(instances
                .iter()
                .all(|instance| Arc::ptr_eq(instance, &instances[0])));
            assert_eq!(owner.bindings().unwrap().len(), 1);
        }
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn test_concurrent_overrides_commit_a_class_once() {
        use std::sync::Barrier;
        use std::thread;

        #[derive(Default)]
        struct FastStore;
        impl Store for FastStore {
            fn backend(&self) -> &'static str {
                "fast"
            }
        }
        crate::service!(FastStore: DiskStore => dyn Store);

        for _ in 0..200 {
            let owner = Arc::new(owner());
            let barrier = Arc::new(Barrier::new(2));

            let spawn = |override_disk: bool| {
                let owner = Arc::clone(&owner);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    if override_disk {
                        owner.override_subclass::<DiskStore, FastStore>()
                    } else {
                        owner.override_subclass::<MemoryStore, FastStore>()
                    }
                })
            };

            let first = spawn(true);
            let second = spawn(false);
            let results = [first.join().unwrap(), second.join().unwrap()];

            let accepted = results.iter().filter(|result| result.is_ok()).count();
            assert_eq!(accepted, 1);
            assert!(results
                .iter()
                .any(|result| matches!(result, Err(RegistryError::AlreadyUsed { .. }))));
        }
    }
}
