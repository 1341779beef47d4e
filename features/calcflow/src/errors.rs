use std::sync::Arc;

use thiserror::Error;

use crate::types::{DynError, TypeInfo};

/// Problems found while discovering the dependency graph
///
/// These abort a build before anything is constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no implementation for capability '{capability}' (required by '{required_by}')")]
    MissingImplementation {
        capability: TypeInfo,
        required_by: TypeInfo,
    },
    #[error("cyclic producer dependency involving '{node}' through {}", render_chain(.chain))]
    CyclicDependency { node: TypeInfo, chain: Vec<TypeInfo> },
}

fn render_chain(chain: &[TypeInfo]) -> String {
    chain
        .iter()
        .map(|info| info.type_name)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A single node failed, halting its branch of the cascade
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    /// The factory failed to create the node
    #[error("Construction of '{node}' failed - error: {error}")]
    Construction { node: TypeInfo, error: Arc<DynError> },
    /// Producer outputs could not be wired into the node
    #[error("Binding of '{node}' failed - error: {error}")]
    Binding { node: TypeInfo, error: Arc<DynError> },
}
impl NodeError {
    pub fn node(&self) -> TypeInfo {
        match self {
            NodeError::Construction { node, .. } | NodeError::Binding { node, .. } => *node,
        }
    }
}

/// Reasons a [`crate::factories::FieldBinder`] refuses to wire a field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingFailure {
    #[error("producer '{producer}' has no result '{key}' for field '{field}'")]
    MissingResultKey {
        field: &'static str,
        key: &'static str,
        producer: TypeInfo,
    },
    #[error("output of producer '{producer}' is not available")]
    DependencyMissing { producer: TypeInfo },
    #[error("the node has no injectable field '{field}'")]
    UnknownField { field: String },
    #[error("injected value is not a '{required_type}'")]
    Downcast { required_type: &'static str },
}

/// The cascade went quiet without producing the root
///
/// Either an upstream node failed, or a pre-seed / cycle kept counters from reaching zero.
#[derive(Debug, Clone)]
pub struct IncompleteBuildError {
    pub root: TypeInfo,
    pub unresolved: Vec<TypeInfo>,
    pub causes: Vec<NodeError>,
}
impl IncompleteBuildError {
    pub fn first_cause(&self) -> Option<&NodeError> {
        self.causes.first()
    }
}
impl std::fmt::Display for IncompleteBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push(format!(
            "Build of '{}' did not complete, unresolved nodes:",
            self.root
        ));
        for node in &self.unresolved {
            display.push(format!("- {}", node));
        }
        if let Some(cause) = self.first_cause() {
            display.push(format!("first failure: {}", cause));
        }
        f.write_str(&display.join("\n"))
    }
}
impl std::error::Error for IncompleteBuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.first_cause()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Errors returned from a build
#[derive(Error, Debug, Clone)]
pub enum BuildError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Incomplete(#[from] IncompleteBuildError),
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    Downcast {
        required_type: &'static str,
        actual_type: &'static str,
    },
}

/// Errors while setting up a [`crate::CalcFlow`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("The concurrent strategy needs at least one worker")]
    NoWorkers,
    #[error("A metadata scanner must be provided")]
    MissingScanner,
    #[error("An instance factory must be provided")]
    MissingFactory,
    #[error("Failed to start the worker pool: {0}")]
    ThreadPool(#[from] std::io::Error),
}
