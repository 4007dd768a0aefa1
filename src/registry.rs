//! Name-keyed, concurrent registries.
//!
//! The engine keeps four registries: trigger factories, handler factories,
//! and the constructed trigger and handler sets. All writes happen during
//! start-up registration; afterwards the hot path is concurrent reads, so
//! the map sits behind a reader-writer lock.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::RegistryError;

/// A thread-safe, name-keyed store of shared items.
///
/// Items are held behind [`Arc`] so `get` hands out cheap clones without
/// holding the lock.
#[derive(Debug)]
pub struct Registry<T: ?Sized> {
    items: RwLock<BTreeMap<String, Arc<T>>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Arc<T>>> {
        self.items
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Arc<T>>> {
        self.items
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register an item under a name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyName`] for an empty name and
    /// [`RegistryError::AlreadyExists`] for a duplicate.
    pub fn register(&self, name: &str, item: Arc<T>) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut items = self.write();
        if items.contains_key(name) {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }
        items.insert(name.to_string(), item);
        Ok(())
    }

    /// Look up an item by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no item has that name.
    pub fn get(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Remove an item by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no item has that name.
    pub fn remove(&self, name: &str) -> Result<(), RegistryError> {
        self.write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// `true` if an item with that name is registered.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// All registered names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Number of registered items.
    #[must_use]
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Remove every item.
    pub fn clear(&self) {
        self.write().clear();
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn register_and_get() {
        let registry: Registry<String> = Registry::new();
        registry
            .register("symlink", Arc::new("handler".to_string()))
            .unwrap();
        assert_eq!(*registry.get("symlink").unwrap(), "handler");
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry: Registry<String> = Registry::new();
        assert_eq!(
            registry.register("", Arc::new(String::new())).unwrap_err(),
            RegistryError::EmptyName
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry: Registry<i32> = Registry::new();
        registry.register("x", Arc::new(1)).unwrap();
        assert_eq!(
            registry.register("x", Arc::new(2)).unwrap_err(),
            RegistryError::AlreadyExists("x".to_string())
        );
        // The original item survives.
        assert_eq!(*registry.get("x").unwrap(), 1);
    }

    #[test]
    fn get_missing_is_not_found() {
        let registry: Registry<i32> = Registry::new();
        assert_eq!(
            registry.get("missing").unwrap_err(),
            RegistryError::NotFound("missing".to_string())
        );
    }

    #[test]
    fn list_is_sorted() {
        let registry: Registry<i32> = Registry::new();
        registry.register("zeta", Arc::new(1)).unwrap();
        registry.register("alpha", Arc::new(2)).unwrap();
        registry.register("mid", Arc::new(3)).unwrap();
        assert_eq!(registry.list(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn remove_clear_count() {
        let registry: Registry<i32> = Registry::new();
        registry.register("a", Arc::new(1)).unwrap();
        registry.register("b", Arc::new(2)).unwrap();
        assert_eq!(registry.count(), 2);
        registry.remove("a").unwrap();
        assert!(!registry.has("a"));
        assert!(registry.remove("a").is_err());
        registry.clear();
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn concurrent_reads_after_startup_registration() {
        let registry: Arc<Registry<i32>> = Arc::new(Registry::new());
        for i in 0..16 {
            registry.register(&format!("item{i}"), Arc::new(i)).unwrap();
        }
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..16 {
                        assert!(reg.has(&format!("item{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn works_with_trait_objects() {
        trait Named: Send + Sync {
            fn name(&self) -> &'static str;
        }
        struct A;
        impl Named for A {
            fn name(&self) -> &'static str {
                "a"
            }
        }
        let registry: Registry<dyn Named> = Registry::new();
        registry.register("a", Arc::new(A)).unwrap();
        assert_eq!(registry.get("a").unwrap().name(), "a");
    }
}
