//! Calcflow builds objects whose fields are filled from the results of producers.
//!
//! A root type declares produced fields, each naming a producer (or a capability implemented by
//! one). Producers may declare produced fields themselves. Calcflow discovers the resulting
//! dependency graph once per root type and then constructs every node exactly once, bottom-up:
//! a node starts as soon as the last of its dependencies has been stored.
//!
//! The crate consists of three parts:
//! 1. [`metadata`] and [`dependency_graph`] - discovering and caching the graph of a root type
//! 2. [`planner`] and the cascade engine - counting pending dependencies and resolving nodes
//! 3. [`CalcFlow`] - wiring it together, with pluggable [`factories`] for construction and binding
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use calcflow::{
//!     CalcFlow, Component, DynError, FactoryRegistry, MetadataCatalog, ProducerOutput,
//!     ProducerResult, Value, RESULT,
//! };
//!
//! #[derive(Default)]
//! struct Answer;
//! impl Component for Answer {
//!     fn result(&self) -> ProducerOutput {
//!         ProducerOutput::from([(RESULT.to_string(), Arc::new(42_u32) as Value)])
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Report {
//!     answer: ProducerResult<u32>,
//! }
//! impl Component for Report {
//!     fn inject(&mut self, _field: &str, value: Value) -> Result<(), DynError> {
//!         self.answer.fill(value)
//!     }
//! }
//!
//! let flow = CalcFlow::builder()
//!     .scanner(MetadataCatalog::new().field::<Report, Answer>("answer"))
//!     .factory(
//!         FactoryRegistry::new()
//!             .register::<Answer>()
//!             .register::<Report>(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let report = flow.produce::<Report>().unwrap();
//! assert_eq!(*report.answer.get(), 42);
//! ```

pub mod builder;
pub mod config;
pub mod container;
pub mod dependency_graph;
pub mod errors;
pub mod factories;
pub mod initiator;
pub mod metadata;
pub mod planner;
mod resolver;
pub mod types;

pub use builder::CalcFlowBuilder;
pub use config::{ExecutionStrategy, FlowConfig};
pub use container::InstanceRegistry;
pub use dependency_graph::{DependencyGraph, GraphBuilder};
pub use errors::{BuildError, IncompleteBuildError, NodeError, ResolutionError};
pub use factories::{FactoryRegistry, FieldBinder, InstanceFactory, ResultKeyBinder, Wiring};
pub use initiator::{BuildOutcome, CalcFlow};
pub use metadata::{MetadataCatalog, MetadataScanner};
pub use types::{
    Component, DynError, FieldDescriptor, Instance, ProducerOutput, ProducerResult, TypeInfo,
    Value, RESULT,
};
