//! Terminal transform

use super::{Transform, TransformKind, TransformPorts};
use crate::datablocks::BlockRef;
use crate::errors::ExecResult;

/// Forwards the final stream to the pipeline's consumer
pub struct SinkTransform {
    name: String,
    ports: TransformPorts,
}

impl SinkTransform {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: TransformPorts::new(),
        }
    }
}

impl Default for SinkTransform {
    fn default() -> Self {
        Self::new("SinkTransform")
    }
}

impl Transform for SinkTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransformKind {
        TransformKind::Sink
    }

    fn ports(&self) -> &TransformPorts {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut TransformPorts {
        &mut self.ports
    }

    fn consume(&mut self, block: BlockRef) -> ExecResult<Vec<BlockRef>> {
        Ok(vec![block])
    }
}
