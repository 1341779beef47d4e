use std::{
    any::TypeId,
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    errors::ResolutionError,
    metadata::MetadataScanner,
    types::{FieldDescriptor, TypeInfo},
};

/// Graph of everything that has to be produced before a root type can be populated
///
/// Built once per requested root and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    requested: TypeInfo,
    root: TypeInfo,
    map: BTreeMap<TypeInfo, DependencyGraphEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DependencyGraphEntry {
    /// Sorted, so field scan order does not leak into the graph
    fields: Vec<BoundField>,
    dependencies: BTreeSet<TypeInfo>,
}

/// A produced field together with the concrete producer that supplies it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundField {
    pub descriptor: FieldDescriptor,
    pub producer: TypeInfo,
}

impl DependencyGraph {
    /// The type the graph was requested for, possibly a capability
    pub fn requested_root(&self) -> TypeInfo {
        self.requested
    }

    /// The concrete node standing in for the requested root
    pub fn root(&self) -> TypeInfo {
        self.root
    }

    pub fn nodes(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.map.keys().copied()
    }

    /// All `(parent, dependency)` edges
    pub fn edges(&self) -> impl Iterator<Item = (TypeInfo, TypeInfo)> + '_ {
        self.map.iter().flat_map(|(parent, entry)| {
            entry
                .dependencies
                .iter()
                .map(move |dependency| (*parent, *dependency))
        })
    }

    pub fn dependencies(&self, node: TypeInfo) -> impl Iterator<Item = TypeInfo> + '_ {
        self.map
            .get(&node)
            .into_iter()
            .flat_map(|entry| entry.dependencies.iter().copied())
    }

    pub fn fields(&self, node: TypeInfo) -> &[BoundField] {
        self.map
            .get(&node)
            .map(|entry| entry.fields.as_slice())
            .unwrap_or_default()
    }

    pub fn contains(&self, node: TypeInfo) -> bool {
        self.map.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Dependencies before their consumers, ties broken by type name
    pub fn topological_order(&self) -> Vec<TypeInfo> {
        let mut remaining: BTreeMap<TypeInfo, usize> = self
            .map
            .iter()
            .map(|(node, entry)| (*node, entry.dependencies.len()))
            .collect();
        let mut order = Vec::with_capacity(self.map.len());

        while let Some(next) = remaining
            .iter()
            .find(|(_, count)| **count == 0)
            .map(|(node, _)| *node)
        {
            remaining.remove(&next);
            order.push(next);
            for (parent, entry) in &self.map {
                if entry.dependencies.contains(&next) {
                    if let Some(count) = remaining.get_mut(parent) {
                        *count -= 1;
                    }
                }
            }
        }

        order
    }
}

impl std::fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push(format!("Dependency graph of '{}':", self.requested));
        for (parent, dependency) in self.edges() {
            display.push(format!("- {} -> {}", parent, dependency));
        }
        f.write_str(&display.join("\n"))
    }
}

/// Discovers dependency graphs and memoizes them per requested root
///
/// The cache lives as long as the builder; [`GraphBuilder::clear_cache`] empties it.
pub struct GraphBuilder {
    scanner: Arc<dyn MetadataScanner>,
    cache: Mutex<HashMap<TypeId, Arc<DependencyGraph>>>,
}

impl GraphBuilder {
    pub fn new(scanner: Arc<dyn MetadataScanner>) -> Self {
        Self {
            scanner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the graph for `root`, scanning metadata only on the first request
    pub fn discover(&self, root: TypeInfo) -> Result<Arc<DependencyGraph>, ResolutionError> {
        if let Some(graph) = self.lock_cache().get(&root.type_id) {
            tracing::debug!("Using cached dependency graph for {}", root.type_name);
            return Ok(graph.clone());
        }

        tracing::debug!("Discovering dependency graph for {}", root.type_name);
        let graph = Arc::new(discover_graph(self.scanner.as_ref(), root)?);
        tracing::debug!(
            "Discovered {} nodes for {}",
            graph.len(),
            root.type_name
        );

        // Another thread may have discovered the same root meanwhile, first one wins
        Ok(self
            .lock_cache()
            .entry(root.type_id)
            .or_insert(graph)
            .clone())
    }

    pub fn is_cached(&self, root: TypeInfo) -> bool {
        self.lock_cache().contains_key(&root.type_id)
    }

    pub fn cached_roots(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<TypeId, Arc<DependencyGraph>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn discover_graph(
    scanner: &dyn MetadataScanner,
    requested: TypeInfo,
) -> Result<DependencyGraph, ResolutionError> {
    // Implementations declared along the root's ancestry, own declarations first
    let mut candidates = Vec::new();
    for ancestor in scanner.ancestry(requested) {
        for implementation in scanner.declared_implementations(ancestor) {
            if !candidates.contains(&implementation) {
                candidates.push(implementation);
            }
        }
    }

    let root = concrete(scanner, &candidates, requested, requested)?;

    let mut map = BTreeMap::new();
    let mut dependency_chain = Vec::new();
    discover_recurse(scanner, &candidates, &mut map, &mut dependency_chain, root)?;

    return Ok(DependencyGraph {
        requested,
        root,
        map,
    });

    fn concrete(
        scanner: &dyn MetadataScanner,
        candidates: &[TypeInfo],
        ty: TypeInfo,
        required_by: TypeInfo,
    ) -> Result<TypeInfo, ResolutionError> {
        if !scanner.is_capability(ty) {
            return Ok(ty);
        }

        candidates
            .iter()
            .find(|candidate| scanner.ancestry(**candidate).contains(&ty))
            .copied()
            .ok_or(ResolutionError::MissingImplementation {
                capability: ty,
                required_by,
            })
    }

    fn discover_recurse(
        scanner: &dyn MetadataScanner,
        candidates: &[TypeInfo],
        map: &mut BTreeMap<TypeInfo, DependencyGraphEntry>,
        dependency_chain: &mut Vec<TypeInfo>,
        node: TypeInfo,
    ) -> Result<(), ResolutionError> {
        // Re-entrance check
        if let Some(start) = dependency_chain.iter().position(|info| *info == node) {
            let mut chain = dependency_chain[start..].to_vec();
            chain.push(node); // Add current so chain is complete
            return Err(ResolutionError::CyclicDependency { node, chain });
        }

        // Skip if already discovered
        if map.contains_key(&node) {
            return Ok(());
        }

        let mut fields = Vec::new();
        for ancestor in scanner.ancestry(node) {
            for descriptor in scanner.declared_fields(ancestor) {
                let producer = concrete(scanner, candidates, descriptor.producer, node)?;
                fields.push(BoundField {
                    descriptor,
                    producer,
                });
            }
        }
        fields.sort();
        fields.dedup();

        let dependencies: BTreeSet<TypeInfo> = fields.iter().map(|field| field.producer).collect();

        dependency_chain.push(node);
        for dependency in &dependencies {
            discover_recurse(scanner, candidates, map, dependency_chain, *dependency)?;
        }
        dependency_chain.pop();

        tracing::trace!(
            "{} depends on {} producer(s)",
            node.type_name,
            dependencies.len()
        );
        map.insert(
            node,
            DependencyGraphEntry {
                fields,
                dependencies,
            },
        );

        Ok(())
    }
}
