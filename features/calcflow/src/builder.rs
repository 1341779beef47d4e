use std::sync::Arc;

use futures::executor::ThreadPool;

use crate::{
    config::{ExecutionStrategy, FlowConfig},
    dependency_graph::GraphBuilder,
    errors::ConfigError,
    factories::{FieldBinder, InstanceFactory, ResultKeyBinder},
    initiator::{CalcFlow, Executor},
    metadata::MetadataScanner,
};

/// Collects the collaborators of a [`CalcFlow`]
///
/// 1. A [`MetadataScanner`] describing types, capabilities and produced fields
/// 2. An [`InstanceFactory`] creating bare nodes
/// 3. Optionally a [`FieldBinder`] (defaults to [`ResultKeyBinder`]) and a [`FlowConfig`]
pub struct CalcFlowBuilder {
    scanner: Option<Arc<dyn MetadataScanner>>,
    factory: Option<Arc<dyn InstanceFactory>>,
    binder: Arc<dyn FieldBinder>,
    config: FlowConfig,
}
impl Default for CalcFlowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CalcFlowBuilder {
    pub fn new() -> Self {
        CalcFlowBuilder {
            scanner: None,
            factory: None,
            binder: Arc::new(ResultKeyBinder),
            config: FlowConfig::default(),
        }
    }
}
impl CalcFlowBuilder {
    pub fn scanner<Scanner: MetadataScanner + 'static>(self, scanner: Scanner) -> Self {
        self.shared_scanner(Arc::new(scanner))
    }

    /// Uses a scanner which is also held elsewhere
    pub fn shared_scanner(mut self, scanner: Arc<dyn MetadataScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn factory<Factory: InstanceFactory + 'static>(mut self, factory: Factory) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn binder<Binder: FieldBinder + 'static>(mut self, binder: Binder) -> Self {
        self.binder = Arc::new(binder);
        self
    }

    pub fn config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn build(self) -> Result<CalcFlow, ConfigError> {
        self.config.validate()?;
        let scanner = self.scanner.ok_or(ConfigError::MissingScanner)?;
        let factory = self.factory.ok_or(ConfigError::MissingFactory)?;

        let executor = match self.config.strategy {
            ExecutionStrategy::Sequential => Executor::Sequential,
            ExecutionStrategy::Concurrent { workers } => {
                let pool = ThreadPool::builder()
                    .pool_size(workers)
                    .name_prefix("calcflow-")
                    .create()?;
                Executor::Concurrent(pool)
            }
        };
        tracing::debug!("Created calculation flow using {:?}", self.config.strategy);

        Ok(CalcFlow {
            graphs: GraphBuilder::new(scanner),
            factory,
            binder: self.binder,
            executor,
            config: self.config,
        })
    }
}
