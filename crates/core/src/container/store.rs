use crate::container::identity::LookupKey;
use crate::errors::RegistryError;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A cached singleton as the container stores it
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Produces the instance for a binding; invoked at most once per registration
pub type ServiceFactory = Arc<dyn Fn() -> ServiceInstance + Send + Sync>;

/// The string-keyed container the registry sits in front of
pub trait ServiceContainer: Send + Sync {
    /// Bind a key to a factory. Re-registering replaces the factory and
    /// discards any instance already cached for the key.
    fn register(&self, key: &LookupKey, factory: ServiceFactory) -> Result<(), RegistryError>;

    /// The cached singleton for a key, instantiating it on first call.
    /// `None` if the key was never registered.
    fn lookup(&self, key: &LookupKey) -> Result<Option<ServiceInstance>, RegistryError>;

    /// Whether the key has a registration
    fn contains(&self, key: &LookupKey) -> bool;
}

struct ContainerEntry {
    factory: ServiceFactory,
    instance: Option<ServiceInstance>,
}

/// Minimal in-memory [`ServiceContainer`] with lazy singletons
pub struct SingletonContainer {
    entries: RwLock<HashMap<LookupKey, ContainerEntry>>,
}

impl SingletonContainer {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Whether the key's singleton has been created
    pub fn is_instantiated(&self, key: &LookupKey) -> bool {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .get(key)
                    .map(|entry| entry.instance.is_some())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SingletonContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SingletonContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonContainer")
            .field("registrations", &self.len())
            .finish()
    }
}

impl ServiceContainer for SingletonContainer {
    fn register(&self, key: &LookupKey, factory: ServiceFactory) -> Result<(), RegistryError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RegistryError::lock("container_entries"))?;

        let replaced = entries
            .insert(
                key.clone(),
                ContainerEntry {
                    factory,
                    instance: None,
                },
            )
            .is_some();

        tracing::trace!(key = %key, replaced, "Registered factory");
        Ok(())
    }

    fn lookup(&self, key: &LookupKey) -> Result<Option<ServiceInstance>, RegistryError> {
        let factory = {
            let entries = self
                .entries
                .read()
                .map_err(|_| RegistryError::lock("container_entries"))?;

            match entries.get(key) {
                None => return Ok(None),
                Some(ContainerEntry {
                    instance: Some(instance),
                    ..
                }) => return Ok(Some(instance.clone())),
                Some(entry) => entry.factory.clone(),
            }
        };

        // Construct outside the lock so a factory may use the container itself.
        let created = factory();

        let mut entries = self
            .entries
            .write()
            .map_err(|_| RegistryError::lock("container_entries"))?;

        match entries.get_mut(key) {
            Some(entry) => {
                let instance = entry.instance.get_or_insert(created).clone();
                tracing::trace!(key = %key, "Instantiated singleton");
                Ok(Some(instance))
            }
            // Registration vanished while constructing; hand out the instance uncached.
            None => Ok(Some(created)),
        }
    }

    fn contains(&self, key: &LookupKey) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_factory(counter: Arc<AtomicUsize>, value: u32) -> ServiceFactory {
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(value) as ServiceInstance
        })
    }

    #[test]
    fn test_lookup_unregistered() {
        let container = SingletonContainer::new();
        let key = LookupKey::new("service:missing");
        assert!(container.lookup(&key).unwrap().is_none());
        assert!(!container.contains(&key));
    }

    #[test]
    fn test_singleton_instantiated_once() {
        let container = SingletonContainer::new();
        let key = LookupKey::new("service:counter");
        let calls = Arc::new(AtomicUsize::new(0));

        container
            .register(&key, counting_factory(calls.clone(), 7))
            .unwrap();
        assert!(container.contains(&key));
        assert!(!container.is_instantiated(&key));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = container.lookup(&key).unwrap().unwrap();
        let second = container.lookup(&key).unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.downcast_ref::<u32>(), Some(&7));
        assert!(container.is_instantiated(&key));
    }

    #[test]
    fn test_reregister_discards_cached_instance() {
        let container = SingletonContainer::new();
        let key = LookupKey::new("service:replaced");
        let calls = Arc::new(AtomicUsize::new(0));

        container
            .register(&key, counting_factory(calls.clone(), 1))
            .unwrap();
        let before = container.lookup(&key).unwrap().unwrap();

        container
            .register(&key, counting_factory(calls.clone(), 2))
            .unwrap();
        assert!(!container.is_instantiated(&key));

        let after = container.lookup(&key).unwrap().unwrap();
        assert_eq!(before.downcast_ref::<u32>(), Some(&1));
        assert_eq!(after.downcast_ref::<u32>(), Some(&2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(container.len(), 1);
    }
}
