use std::{any::TypeId, collections::HashMap, sync::Arc};

use thiserror::Error;

use crate::{
    errors::BindingFailure,
    types::{Component, DynError, FieldDescriptor, ProducerOutput, TypeInfo},
};

/// Creates bare instances of nodes
///
/// How construction happens is up to the implementation, it could as well be backed by a DI container.
pub trait InstanceFactory: Send + Sync {
    /// Constructs a new, not yet bound, instance of `node`
    fn create(&self, node: &TypeInfo) -> Result<Box<dyn Component>, DynError>;
}
impl<F: InstanceFactory + ?Sized> InstanceFactory for Arc<F> {
    fn create(&self, node: &TypeInfo) -> Result<Box<dyn Component>, DynError> {
        (**self).create(node)
    }
}

type Constructor = Box<dyn Fn() -> Result<Box<dyn Component>, DynError> + Send + Sync>;

#[derive(Error, Debug, Clone)]
#[error("No constructor registered for '{0}'")]
pub struct UnknownNode(pub TypeInfo);

/// Factory backed by registered constructor functions
#[derive(Default)]
pub struct FactoryRegistry {
    constructors: HashMap<TypeId, Constructor>,
}
impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` to be created through its `Default` impl
    pub fn register<T: Component + Default>(self) -> Self {
        self.register_with(|| Ok::<_, DynError>(T::default()))
    }

    /// Registers a fallible constructor for `T`
    pub fn register_with<T, E, F>(mut self, constructor: F) -> Self
    where
        T: Component,
        E: Into<DynError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.constructors.insert(
            TypeId::of::<T>(),
            Box::new(move || -> Result<Box<dyn Component>, DynError> {
                constructor()
                    .map(|instance| Box::new(instance) as Box<dyn Component>)
                    .map_err(Into::into)
            }),
        );
        self
    }

    pub fn contains(&self, node: &TypeInfo) -> bool {
        self.constructors.contains_key(&node.type_id)
    }
}
impl InstanceFactory for FactoryRegistry {
    fn create(&self, node: &TypeInfo) -> Result<Box<dyn Component>, DynError> {
        match self.constructors.get(&node.type_id) {
            Some(constructor) => constructor(),
            None => Err(Box::new(UnknownNode(*node))),
        }
    }
}

/// One produced field of a node and the full output of its producer
pub struct Wiring<'a> {
    pub field: &'a FieldDescriptor,
    pub producer: TypeInfo,
    pub output: &'a ProducerOutput,
}

/// Wires producer outputs into a freshly created instance
pub trait FieldBinder: Send + Sync {
    fn bind(&self, target: &mut dyn Component, wiring: &[Wiring<'_>]) -> Result<(), DynError>;
}
impl<B: FieldBinder + ?Sized> FieldBinder for Arc<B> {
    fn bind(&self, target: &mut dyn Component, wiring: &[Wiring<'_>]) -> Result<(), DynError> {
        (**self).bind(target, wiring)
    }
}

/// Selects each field's value by its result key and hands it to [`Component::inject`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultKeyBinder;
impl FieldBinder for ResultKeyBinder {
    fn bind(&self, target: &mut dyn Component, wiring: &[Wiring<'_>]) -> Result<(), DynError> {
        for Wiring {
            field,
            producer,
            output,
        } in wiring
        {
            let value = output
                .get(field.result_key)
                .ok_or(BindingFailure::MissingResultKey {
                    field: field.name,
                    key: field.result_key,
                    producer: *producer,
                })?;
            target.inject(field.name, value.clone())?;
        }

        Ok(())
    }
}
