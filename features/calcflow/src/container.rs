use std::{
    any::TypeId,
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    errors::BuildError,
    types::{Component, Instance, TypeInfo},
};

/// Registry holding all constructed and pre-seeded instances of a build
///
/// Every node is written at most once. Clones share the same storage.
#[derive(Clone, Default)]
pub struct InstanceRegistry(Arc<RwLock<HashMap<TypeId, Instance>>>);

impl Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let instances = self.read();
        let mut list = f.debug_list();
        for instance in instances.values() {
            list.entry(&instance.info.type_name);
        }
        list.finish()
    }
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds an already constructed component
    pub fn with<T: Component>(self, instance: T) -> Self {
        self.insert(instance);
        self
    }

    /// Pre-seeds an already constructed component
    ///
    /// Returns false if the type was already present; the existing instance is kept.
    pub fn insert<T: Component>(&self, instance: T) -> bool {
        self.insert_instance(Instance::new(instance))
    }

    /// Stores an instance under its own identity, refusing to overwrite
    pub fn insert_instance(&self, instance: Instance) -> bool {
        let mut instances = self.write();
        if instances.contains_key(&instance.info.type_id) {
            return false;
        }
        instances.insert(instance.info.type_id, instance);
        true
    }

    pub fn get(&self, node: TypeInfo) -> Option<Instance> {
        self.read().get(&node.type_id).cloned()
    }

    /// Attempts to get the requested type
    pub fn require<T: Component>(&self) -> Result<Option<Arc<T>>, BuildError> {
        self.get(TypeInfo::of::<T>())
            .map(|instance| {
                instance
                    .downcast::<T>()
                    .map_err(|actual_type| BuildError::Downcast {
                        required_type: std::any::type_name::<T>(),
                        actual_type,
                    })
            })
            .transpose()
    }

    pub fn contains(&self, node: TypeInfo) -> bool {
        self.read().contains_key(&node.type_id)
    }

    /// Identities of all stored instances
    pub fn keys(&self) -> Vec<TypeInfo> {
        self.read().values().map(|instance| instance.info).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copies the current content into an independent registry
    pub fn snapshot(&self) -> InstanceRegistry {
        InstanceRegistry(Arc::new(RwLock::new(self.read().clone())))
    }

    pub fn into_instances(self) -> Vec<Instance> {
        let instances = self.read().values().cloned().collect();
        instances
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Instance>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Instance>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}
