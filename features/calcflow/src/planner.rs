use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::{dependency_graph::DependencyGraph, types::TypeInfo};

/// Pending counts and reverse edges for one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPlan {
    pending: BTreeMap<TypeInfo, usize>,
    consumers: BTreeMap<TypeInfo, BTreeSet<TypeInfo>>,
    required: BTreeSet<TypeInfo>,
}

impl ResolutionPlan {
    /// Plans a build of `graph` where `pre_resolved` nodes are already available
    ///
    /// Covers every graph node as well as every pre-resolved node.
    pub fn new(graph: &DependencyGraph, pre_resolved: &HashSet<TypeInfo>) -> Self {
        let mut pending = BTreeMap::new();
        let mut consumers: BTreeMap<TypeInfo, BTreeSet<TypeInfo>> = BTreeMap::new();

        for node in graph.nodes().chain(pre_resolved.iter().copied()) {
            let count = graph
                .dependencies(node)
                .filter(|dependency| !pre_resolved.contains(dependency))
                .count();
            pending.insert(node, count);
            consumers.entry(node).or_default();
        }

        for (parent, dependency) in graph.edges() {
            consumers.entry(dependency).or_default().insert(parent);
        }

        let required = required_nodes(graph, pre_resolved);

        Self {
            pending,
            consumers,
            required,
        }
    }

    /// Number of dependencies of `node` still to be produced
    pub fn pending(&self, node: TypeInfo) -> usize {
        self.pending.get(&node).copied().unwrap_or_default()
    }

    /// Nodes consuming the output of `node`
    pub fn consumers(&self, node: TypeInfo) -> impl Iterator<Item = TypeInfo> + '_ {
        self.consumers
            .get(&node)
            .into_iter()
            .flat_map(|consumers| consumers.iter().copied())
    }

    pub fn nodes(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.pending.keys().copied()
    }

    /// Nodes which can start right away
    pub fn initially_ready(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| *node)
    }

    /// Nodes this build has to construct
    pub fn required(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.required.iter().copied()
    }

    pub fn is_required(&self, node: TypeInfo) -> bool {
        self.required.contains(&node)
    }
}

/// Nodes reachable from the root without passing through a pre-resolved node
fn required_nodes(graph: &DependencyGraph, pre_resolved: &HashSet<TypeInfo>) -> BTreeSet<TypeInfo> {
    let mut required = BTreeSet::new();
    let mut stack = vec![graph.root()];
    while let Some(node) = stack.pop() {
        if pre_resolved.contains(&node) || !required.insert(node) {
            continue;
        }
        stack.extend(graph.dependencies(node));
    }
    required
}
