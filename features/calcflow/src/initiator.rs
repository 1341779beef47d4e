use std::{collections::HashSet, sync::Arc};

use futures::executor::ThreadPool;

use crate::{
    builder::CalcFlowBuilder,
    config::FlowConfig,
    container::InstanceRegistry,
    dependency_graph::GraphBuilder,
    errors::{BuildError, IncompleteBuildError},
    factories::{FieldBinder, InstanceFactory},
    planner::ResolutionPlan,
    resolver::{concurrent, sequential, Cascade, NodeState},
    types::{Component, Instance, TypeInfo},
};

pub(crate) enum Executor {
    Sequential,
    Concurrent(ThreadPool),
}

/// Result of a build: the root and everything produced on the way
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub root: Instance,
    /// Pre-seeded and constructed instances, usable as the pre-seed of a later build
    pub registry: InstanceRegistry,
}

/// Builds root types by resolving their producers in dependency order
///
/// Discovered graphs are kept for the lifetime of the flow, see [`CalcFlow::graph_builder`].
pub struct CalcFlow {
    pub(crate) graphs: GraphBuilder,
    pub(crate) factory: Arc<dyn InstanceFactory>,
    pub(crate) binder: Arc<dyn FieldBinder>,
    pub(crate) executor: Executor,
    pub(crate) config: FlowConfig,
}

impl CalcFlow {
    pub fn builder() -> CalcFlowBuilder {
        CalcFlowBuilder::new()
    }

    pub fn graph_builder(&self) -> &GraphBuilder {
        &self.graphs
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Builds `root`, treating everything in `pre_seeded` as already available
    pub fn build_class(
        &self,
        root: TypeInfo,
        pre_seeded: &InstanceRegistry,
    ) -> Result<Instance, BuildError> {
        self.build_outcome(root, pre_seeded)
            .map(|outcome| outcome.root)
    }

    /// Builds `T` from scratch
    pub fn produce<T: Component>(&self) -> Result<Arc<T>, BuildError> {
        self.produce_with(&InstanceRegistry::new())
    }

    /// Builds `T`, treating everything in `pre_seeded` as already available
    pub fn produce_with<T: Component>(
        &self,
        pre_seeded: &InstanceRegistry,
    ) -> Result<Arc<T>, BuildError> {
        let instance = self.build_class(TypeInfo::of::<T>(), pre_seeded)?;
        instance
            .downcast::<T>()
            .map_err(|actual_type| BuildError::Downcast {
                required_type: std::any::type_name::<T>(),
                actual_type,
            })
    }

    /// Builds `root` and returns every instance of the build
    ///
    /// `pre_seeded` itself is left untouched, the build works on its own copy.
    pub fn build_outcome(
        &self,
        root: TypeInfo,
        pre_seeded: &InstanceRegistry,
    ) -> Result<BuildOutcome, BuildError> {
        // Discovery errors abort before anything is constructed
        let graph = self.graphs.discover(root)?;
        if self.config.log_graph {
            tracing::debug!("{graph}");
        }

        let registry = pre_seeded.snapshot();
        let pre_resolved: HashSet<TypeInfo> = registry.keys().into_iter().collect();
        let plan = ResolutionPlan::new(&graph, &pre_resolved);
        let cascade = Arc::new(Cascade::new(
            graph.clone(),
            &plan,
            registry.clone(),
            self.factory.clone(),
            self.binder.clone(),
        ));

        let seeds: Vec<TypeInfo> = plan
            .initially_ready()
            .filter(|node| plan.is_required(*node))
            .collect();
        tracing::debug!(
            "Building {} - {} nodes, {} to construct, {} pre-seeded, {} ready to start",
            root.type_name,
            graph.len(),
            plan.required().count(),
            pre_resolved.len(),
            seeds.len()
        );

        let failures = match &self.executor {
            Executor::Sequential => sequential::run(&cascade, seeds),
            Executor::Concurrent(pool) => concurrent::run(cascade.clone(), pool, seeds),
        };

        // Quiescence check
        if let Some(instance) = registry.get(graph.root()) {
            tracing::debug!("Finished building {}", root.type_name);
            return Ok(BuildOutcome {
                root: instance,
                registry,
            });
        }

        let unresolved = cascade.unresolved();
        let failed = unresolved
            .iter()
            .filter(|node| cascade.state(**node) == Some(NodeState::Failed))
            .count();
        tracing::error!(
            "Build of {} stopped with {} unresolved node(s), {} of them failed",
            root.type_name,
            unresolved.len(),
            failed
        );

        Err(IncompleteBuildError {
            root: graph.root(),
            unresolved,
            causes: failures,
        }
        .into())
    }
}
