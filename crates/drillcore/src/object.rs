use crate::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a live scene object, issued by the scene host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(pub u64);

impl ObjectHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name-keyed lookup of scene objects
pub trait ObjectLookup {
    fn lookup(&self, name: &str) -> Result<ObjectHandle, RegistryError>;
}

/// A prop bound by name at authoring time.
///
/// `resolved_id` only caches the last handle seen for `display_name`; it is
/// recomputed from the name whenever it is missing or no longer matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedObjectRef {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<ObjectHandle>,
}

impl LinkedObjectRef {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            resolved_id: None,
        }
    }

    /// Resolve against `lookup`, refreshing the cached handle if it is stale.
    pub fn resolve(&mut self, lookup: &dyn ObjectLookup) -> Result<ObjectHandle, RegistryError> {
        let handle = lookup.lookup(&self.display_name)?;
        if self.resolved_id != Some(handle) {
            tracing::debug!(
                "Rebinding '{}' from {:?} to {}",
                self.display_name,
                self.resolved_id,
                handle
            );
            self.resolved_id = Some(handle);
        }
        Ok(handle)
    }

    pub fn is_stale(&self, current: ObjectHandle) -> bool {
        self.resolved_id != Some(current)
    }
}

impl From<&str> for LinkedObjectRef {
    fn from(name: &str) -> Self {
        LinkedObjectRef::new(name)
    }
}
