use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::Debug,
    sync::Arc,
};

use crate::errors::BindingFailure;

/// All errors must be Send + Sync so they can cross the worker pool
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// A single value handed out by a producer
pub type Value = Arc<dyn Any + Send + Sync>;

/// Named values a producer supplies to its consumers
pub type ProducerOutput = HashMap<String, Value>;

/// Result key used when a field does not name one explicitly
pub const RESULT: &str = "result";

/// Upcasting helper, implemented for every sized `Any + Send + Sync` type
pub trait AsAny: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}
impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Anything the engine can construct, wire and hand out.
///
/// A type becomes a producer simply by returning something from [`Component::result`].
/// Types which only consume (e.g. the root of a build) keep the default.
pub trait Component: AsAny {
    /// Values this node supplies to the nodes depending on it
    fn result(&self) -> ProducerOutput {
        ProducerOutput::new()
    }

    /// Receives a value for one of the node's produced fields
    fn inject(&mut self, field: &str, _value: Value) -> Result<(), DynError> {
        Err(Box::new(BindingFailure::UnknownField {
            field: field.to_string(),
        }))
    }
}

/// Instance of a Node
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub object: Arc<dyn Component>,
}
impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

impl Instance {
    pub fn new<T: Component>(object: T) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            object: Arc::new(object),
        }
    }

    /// Wraps an already boxed component, keeping `info` as its identity
    pub(crate) fn from_boxed(info: TypeInfo, object: Box<dyn Component>) -> Self {
        Instance {
            info,
            object: Arc::from(object),
        }
    }

    pub fn downcast<T: Component>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.object.clone().into_any()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }

    /// Output of this instance when acting as a producer
    pub fn output(&self) -> ProducerOutput {
        self.object.result()
    }
}

/// Typed slot for a value injected from a producer's output
pub struct ProducerResult<T> {
    value: Option<Arc<T>>,
}
impl<T> Default for ProducerResult<T> {
    fn default() -> Self {
        Self { value: None }
    }
}
impl<T: Debug> Debug for ProducerResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ProducerResult").field(&self.value).finish()
    }
}
impl<T: Send + Sync + 'static> ProducerResult<T> {
    /// Stores an injected value, failing if it is not a `T`
    pub fn fill(&mut self, value: Value) -> Result<(), DynError> {
        match Arc::downcast::<T>(value) {
            Ok(value) => {
                self.value = Some(value);
                Ok(())
            }
            Err(_) => Err(Box::new(BindingFailure::Downcast {
                required_type: std::any::type_name::<T>(),
            })),
        }
    }

    pub fn try_get(&self) -> Option<&T> {
        self.value.as_deref()
    }

    /// Accesses the injected value
    ///
    /// # Panics
    /// - When read before the owning node has been bound
    pub fn get(&self) -> &T {
        self.try_get()
            .expect("ProducerResult accessed before it was bound")
    }

    pub fn shared(&self) -> Option<Arc<T>> {
        self.value.clone()
    }
}

/// Type Name and Type Id
///
/// Identifies nodes as well as capabilities, e.g. `TypeInfo::of::<dyn Source>()`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// A field of a node which is populated from a producer's output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldDescriptor {
    /// Name handed to [`Component::inject`]
    pub name: &'static str,
    /// Producer type or capability supplying the value
    pub producer: TypeInfo,
    /// Key selecting the value from the producer's output
    pub result_key: &'static str,
}
impl FieldDescriptor {
    pub fn new(name: &'static str, producer: TypeInfo) -> Self {
        Self::keyed(name, producer, RESULT)
    }

    pub fn keyed(name: &'static str, producer: TypeInfo, result_key: &'static str) -> Self {
        FieldDescriptor {
            name,
            producer,
            result_key,
        }
    }
}
