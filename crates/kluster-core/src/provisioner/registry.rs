//! Name to provisioner resolution
//!
//! The registry is built once at startup and handed to the cluster manager.
//! Membership is fixed after `build()`; clones share the same table, so
//! concurrent lookups need no locking.

use super::Provisioner;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Immutable table of named provisioners
#[derive(Clone, Default)]
pub struct ProvisionerRegistry {
    provisioners: Arc<HashMap<String, Arc<dyn Provisioner>>>,
}

impl ProvisionerRegistry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a provisioner; absence means the provider is unsupported here
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provisioner>> {
        self.provisioners.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.provisioners.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.provisioners.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.provisioners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.provisioners.is_empty()
    }
}

impl fmt::Debug for ProvisionerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionerRegistry")
            .field("provisioners", &self.names())
            .finish()
    }
}

/// Builder collecting provisioners before the registry is frozen
#[derive(Default)]
pub struct RegistryBuilder {
    provisioners: HashMap<String, Arc<dyn Provisioner>>,
}

impl RegistryBuilder {
    /// Register a provisioner under `name`; a later registration replaces it
    pub fn register(
        self,
        name: impl Into<String>,
        provisioner: impl Provisioner + 'static,
    ) -> Self {
        self.register_arc(name, Arc::new(provisioner))
    }

    /// Register a shared provisioner (e.g. one instance under several names)
    pub fn register_arc(
        mut self,
        name: impl Into<String>,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        let name = name.into();
        if self.provisioners.insert(name.clone(), provisioner).is_some() {
            warn!(provisioner = %name, "Replacing previously registered provisioner");
        }
        self
    }

    /// Freeze the table
    pub fn build(self) -> ProvisionerRegistry {
        ProvisionerRegistry {
            provisioners: Arc::new(self.provisioners),
        }
    }
}
