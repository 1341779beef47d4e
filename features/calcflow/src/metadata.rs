use std::{
    any::TypeId,
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::types::{FieldDescriptor, TypeInfo, RESULT};

/// Source of the declarative metadata the graph is discovered from
pub trait MetadataScanner: Send + Sync {
    /// The type itself followed by its supertypes and implemented capabilities, nearest first
    fn ancestry(&self, ty: TypeInfo) -> Vec<TypeInfo>;

    /// Capability implementations declared directly on `ty`, in declaration order
    fn declared_implementations(&self, ty: TypeInfo) -> Vec<TypeInfo>;

    /// Produced fields declared directly on `ty` (inherited ones are found via [`Self::ancestry`])
    fn declared_fields(&self, ty: TypeInfo) -> Vec<FieldDescriptor>;

    /// Whether `ty` is an abstract capability which needs an implementation
    fn is_capability(&self, ty: TypeInfo) -> bool;
}

/// In-memory capability registry, filled by an upfront registration pass
///
/// ```rust
/// use calcflow::{metadata::MetadataCatalog, types::Component};
///
/// trait Source: Send + Sync {}
///
/// #[derive(Default)]
/// struct Dto;
/// impl Component for Dto {}
///
/// #[derive(Default)]
/// struct FixedSource;
/// impl Component for FixedSource {}
/// impl Source for FixedSource {}
///
/// let catalog = MetadataCatalog::new()
///     .capability::<dyn Source>()
///     .extends::<FixedSource, dyn Source>()
///     .prepare::<Dto, FixedSource>()
///     .field::<Dto, dyn Source>("source");
///
/// assert_eq!(catalog.fields_of::<Dto>().len(), 1);
/// ```
#[derive(Default)]
pub struct MetadataCatalog {
    supertypes: HashMap<TypeId, Vec<TypeInfo>>,
    implementations: HashMap<TypeId, Vec<TypeInfo>>,
    fields: HashMap<TypeId, Vec<FieldDescriptor>>,
    capabilities: HashSet<TypeId>,
    scans: AtomicUsize,
}

impl MetadataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `C` (usually a `dyn Trait`) as an abstract capability
    pub fn capability<C: ?Sized + 'static>(mut self) -> Self {
        self.capabilities.insert(TypeId::of::<C>());
        self
    }

    /// Declares `Super` as a direct supertype or implemented capability of `T`
    pub fn extends<T: ?Sized + 'static, Super: ?Sized + 'static>(mut self) -> Self {
        let supertypes = self.supertypes.entry(TypeId::of::<T>()).or_default();
        let info = TypeInfo::of::<Super>();
        if !supertypes.contains(&info) {
            supertypes.push(info);
        }
        self
    }

    /// Declares `Impl` as a capability implementation available to builds rooted at `T`
    pub fn prepare<T: ?Sized + 'static, Impl: ?Sized + 'static>(mut self) -> Self {
        let implementations = self.implementations.entry(TypeId::of::<T>()).or_default();
        let info = TypeInfo::of::<Impl>();
        if !implementations.contains(&info) {
            implementations.push(info);
        }
        self
    }

    /// Declares a field of `Owner` filled from the default result of `Producer`
    pub fn field<Owner: ?Sized + 'static, Producer: ?Sized + 'static>(
        self,
        name: &'static str,
    ) -> Self {
        self.field_keyed::<Owner, Producer>(name, RESULT)
    }

    /// Declares a field of `Owner` filled from the `key` result of `Producer`
    pub fn field_keyed<Owner: ?Sized + 'static, Producer: ?Sized + 'static>(
        self,
        name: &'static str,
        key: &'static str,
    ) -> Self {
        self.declare_field(
            TypeInfo::of::<Owner>(),
            FieldDescriptor::keyed(name, TypeInfo::of::<Producer>(), key),
        )
    }

    /// Declares a field for an owner only known at runtime
    pub fn declare_field(mut self, owner: TypeInfo, descriptor: FieldDescriptor) -> Self {
        self.fields
            .entry(owner.type_id)
            .or_default()
            .push(descriptor);
        self
    }

    pub fn fields_of<T: ?Sized + 'static>(&self) -> &[FieldDescriptor] {
        self.fields
            .get(&TypeId::of::<T>())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of field scans served so far
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }
}

impl MetadataScanner for MetadataCatalog {
    fn ancestry(&self, ty: TypeInfo) -> Vec<TypeInfo> {
        // Breadth first, so nearer supertypes come before more distant ones
        let mut ancestry = vec![ty];
        let mut index = 0;
        while index < ancestry.len() {
            let current = ancestry[index];
            for supertype in self.supertypes.get(&current.type_id).into_iter().flatten() {
                if !ancestry.contains(supertype) {
                    ancestry.push(*supertype);
                }
            }
            index += 1;
        }
        ancestry
    }

    fn declared_implementations(&self, ty: TypeInfo) -> Vec<TypeInfo> {
        self.implementations
            .get(&ty.type_id)
            .cloned()
            .unwrap_or_default()
    }

    fn declared_fields(&self, ty: TypeInfo) -> Vec<FieldDescriptor> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.fields.get(&ty.type_id).cloned().unwrap_or_default()
    }

    fn is_capability(&self, ty: TypeInfo) -> bool {
        self.capabilities.contains(&ty.type_id)
    }
}
