//! Execution context handed to every executor

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::observability::MetricsRegistry;

/// Session-scoped handles shared by the executors of one query.
///
/// Cheap to clone. Executors read from it and never modify it.
#[derive(Debug, Clone)]
pub struct ExecutorContext {
    pub session_id: Uuid,
    pub config: Arc<EngineConfig>,
    pub metrics: Arc<MetricsRegistry>,
    /// Parent token for every pipeline built in this session
    pub cancel: CancellationToken,
}

impl ExecutorContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            config: Arc::new(config),
            metrics: Arc::new(MetricsRegistry::new()),
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for ExecutorContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
