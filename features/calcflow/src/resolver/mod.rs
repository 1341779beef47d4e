//! The cascade engine
//!
//! Every node of a build gets a [`NodeResolver`] holding its pending counter. Once the counter
//! reaches zero the node is constructed, bound, stored, and its consumers are notified.
//! Strategies only decide where the nodes returned by [`Cascade::resolve`] run next.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU8, AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{
    container::InstanceRegistry,
    dependency_graph::DependencyGraph,
    errors::{BindingFailure, NodeError},
    factories::{FieldBinder, InstanceFactory, Wiring},
    planner::ResolutionPlan,
    types::{DynError, Instance, ProducerOutput, TypeInfo},
};

pub(crate) mod concurrent;
pub(crate) mod sequential;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    Unresolved = 0,
    Resolving = 1,
    Resolved = 2,
    Failed = 3,
}
impl NodeState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => NodeState::Unresolved,
            1 => NodeState::Resolving,
            2 => NodeState::Resolved,
            _ => NodeState::Failed,
        }
    }
}

/// What a call to [`Cascade::resolve`] did
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// The node was built, carrying the consumers it made ready
    Resolved(Vec<TypeInfo>),
    /// Nothing to do, the node is not part of the build, present already or claimed elsewhere
    Skipped,
}

/// Per build state of a single node
pub(crate) struct NodeResolver {
    pending: AtomicUsize,
    consumers: Vec<TypeInfo>,
    state: AtomicU8,
}
impl NodeResolver {
    fn new(pending: usize, consumers: Vec<TypeInfo>) -> Self {
        Self {
            pending: AtomicUsize::new(pending),
            consumers,
            state: AtomicU8::new(NodeState::Unresolved as u8),
        }
    }

    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Claims the node, only one caller ever gets `true`
    fn begin(&self) -> bool {
        self.state
            .compare_exchange(
                NodeState::Unresolved as u8,
                NodeState::Resolving as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn finish(&self, state: NodeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Decrements the pending counter, returns true for the caller landing on zero
    fn satisfy_one(&self) -> bool {
        match self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            }) {
            Ok(previous) => previous == 1,
            Err(_) => false,
        }
    }
}

/// Shared state of one build
pub(crate) struct Cascade {
    graph: Arc<DependencyGraph>,
    registry: InstanceRegistry,
    factory: Arc<dyn InstanceFactory>,
    binder: Arc<dyn FieldBinder>,
    resolvers: HashMap<TypeInfo, NodeResolver>,
}

impl Cascade {
    pub fn new(
        graph: Arc<DependencyGraph>,
        plan: &ResolutionPlan,
        registry: InstanceRegistry,
        factory: Arc<dyn InstanceFactory>,
        binder: Arc<dyn FieldBinder>,
    ) -> Self {
        let resolvers = plan
            .required()
            .map(|node| {
                let resolver = NodeResolver::new(plan.pending(node), plan.consumers(node).collect());
                (node, resolver)
            })
            .collect();

        Self {
            graph,
            registry,
            factory,
            binder,
            resolvers,
        }
    }

    pub fn state(&self, node: TypeInfo) -> Option<NodeState> {
        self.resolvers.get(&node).map(NodeResolver::state)
    }

    /// Required nodes without an instance, in graph order
    pub fn unresolved(&self) -> Vec<TypeInfo> {
        self.graph
            .nodes()
            .filter(|node| self.resolvers.contains_key(node) && !self.registry.contains(*node))
            .collect()
    }

    /// Resolves `node` and returns the consumers it made ready
    ///
    /// A no-op for nodes which are already present in the registry or claimed by another caller.
    pub fn resolve(&self, node: TypeInfo) -> Result<Resolution, NodeError> {
        let Some(resolver) = self.resolvers.get(&node) else {
            return Ok(Resolution::Skipped);
        };

        // Pre-seeded or already built
        if self.registry.contains(node) || !resolver.begin() {
            return Ok(Resolution::Skipped);
        }

        let instance = match self.construct(node) {
            Ok(instance) => instance,
            Err(err) => {
                tracing::warn!("{err}");
                resolver.finish(NodeState::Failed);
                return Err(err);
            }
        };

        // Store before notify, consumers read this instance while binding
        if !self.registry.insert_instance(instance) {
            tracing::debug!("{} was stored concurrently, keeping the existing instance", node);
        }
        resolver.finish(NodeState::Resolved);
        tracing::debug!("Resolved {}", node.type_name);

        Ok(Resolution::Resolved(self.notify_consumers(resolver)))
    }

    fn construct(&self, node: TypeInfo) -> Result<Instance, NodeError> {
        let mut object = self
            .factory
            .create(&node)
            .map_err(|error| NodeError::Construction {
                node,
                error: Arc::new(error),
            })?;

        let binding_error = |error: DynError| NodeError::Binding {
            node,
            error: Arc::new(error),
        };

        let fields = self.graph.fields(node);
        let mut outputs: BTreeMap<TypeInfo, ProducerOutput> = BTreeMap::new();
        for field in fields {
            if outputs.contains_key(&field.producer) {
                continue;
            }
            let producer = self.registry.get(field.producer).ok_or_else(|| {
                binding_error(
                    BindingFailure::DependencyMissing {
                        producer: field.producer,
                    }
                    .into(),
                )
            })?;
            outputs.insert(field.producer, producer.output());
        }

        let wiring: Vec<Wiring<'_>> = fields
            .iter()
            .map(|field| Wiring {
                field: &field.descriptor,
                producer: field.producer,
                output: &outputs[&field.producer],
            })
            .collect();

        self.binder
            .bind(object.as_mut(), &wiring)
            .map_err(binding_error)?;

        Ok(Instance::from_boxed(node, object))
    }

    fn notify_consumers(&self, resolver: &NodeResolver) -> Vec<TypeInfo> {
        let mut ready = Vec::new();
        for consumer in &resolver.consumers {
            let Some(consumer_resolver) = self.resolvers.get(consumer) else {
                continue;
            };
            if consumer_resolver.satisfy_one() {
                tracing::trace!("{} has no pending dependencies left", consumer.type_name);
                ready.push(*consumer);
            }
        }
        ready
    }
}
