use drillcore::{ObjectHandle, ObjectLookup, RegistryError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Scene-scoped directory of simulation props, keyed by authoring name
pub struct ObjectRegistry {
    objects: RwLock<HashMap<String, ObjectHandle>>,
    next_handle: AtomicU64,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Bind `name` to `handle`. The last registration wins; the replaced
    /// handle is returned and logged, since flows rely on names being unique.
    pub fn register(&self, name: impl Into<String>, handle: ObjectHandle) -> Option<ObjectHandle> {
        let name = name.into();
        let previous = self
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), handle);
        match previous {
            Some(old) if old != handle => {
                tracing::warn!("Object '{}' re-registered: {} replaced by {}", name, old, handle);
            }
            _ => tracing::debug!("Registered object '{}' as {}", name, handle),
        }
        previous
    }

    /// Register `name` under a freshly allocated handle.
    pub fn register_new(&self, name: impl Into<String>) -> ObjectHandle {
        let handle = ObjectHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.register(name, handle);
        handle
    }

    /// Rebuild the registry from one pass over the scene's tagged props.
    /// Returns the names that were registered more than once.
    pub fn populate<I, S>(&self, props: I) -> Vec<String>
    where
        I: IntoIterator<Item = (S, ObjectHandle)>,
        S: Into<String>,
    {
        self.clear();
        let mut duplicates = Vec::new();
        for (name, handle) in props {
            let name = name.into();
            if self.register(name.clone(), handle).is_some() && !duplicates.contains(&name) {
                duplicates.push(name);
            }
        }
        tracing::info!(
            "Object registry populated with {} props ({} duplicate names)",
            self.len(),
            duplicates.len()
        );
        duplicates
    }

    pub fn resolve(&self, name: &str) -> Result<ObjectHandle, RegistryError> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn unregister(&self, name: &str) -> Option<ObjectHandle> {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Drop every binding to a destroyed object.
    pub fn destroy(&self, handle: ObjectHandle) -> usize {
        let mut objects = self
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = objects.len();
        objects.retain(|_, h| *h != handle);
        before - objects.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Scene unload.
    pub fn clear(&self) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ObjectLookup for ObjectRegistry {
    fn lookup(&self, name: &str) -> Result<ObjectHandle, RegistryError> {
        self.resolve(name)
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
