use crate::errors::ConfigError;

/// How the cascade is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Single thread, ready nodes are processed from a work queue
    #[default]
    Sequential,
    /// Each ready node is resolved as its own task on a worker pool
    Concurrent { workers: usize },
}

/// Settings of a [`crate::CalcFlow`]
///
/// # Example
/// ```rust
/// use calcflow::config::{ExecutionStrategy, FlowConfig};
///
/// let config = FlowConfig::default()
///     .with_strategy(ExecutionStrategy::Concurrent { workers: 4 })
///     .with_log_graph(true);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FlowConfig {
    pub strategy: ExecutionStrategy,
    /// Log every discovered graph at debug level
    pub log_graph: bool,
}

impl FlowConfig {
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_log_graph(mut self, log_graph: bool) -> Self {
        self.log_graph = log_graph;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.strategy {
            ExecutionStrategy::Concurrent { workers: 0 } => Err(ConfigError::NoWorkers),
            _ => Ok(()),
        }
    }
}
