//! Column projection transform

use std::sync::Arc;

use super::{Transform, TransformKind, TransformPorts};
use crate::datablocks::BlockRef;
use crate::errors::ExecResult;

/// Keeps the named columns, in the given order
pub struct ProjectionTransform {
    name: String,
    ports: TransformPorts,
    columns: Vec<String>,
}

impl ProjectionTransform {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: "ProjectionTransform".to_string(),
            ports: TransformPorts::new(),
            columns,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Transform for ProjectionTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransformKind {
        TransformKind::Streaming
    }

    fn ports(&self) -> &TransformPorts {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut TransformPorts {
        &mut self.ports
    }

    fn consume(&mut self, block: BlockRef) -> ExecResult<Vec<BlockRef>> {
        Ok(vec![Arc::new(block.project(&self.columns)?)])
    }
}
