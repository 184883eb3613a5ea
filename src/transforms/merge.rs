//! Fan-in transform

use super::{Transform, TransformKind, TransformPorts};
use crate::datablocks::{BlockRef, ColumnDescriptor};
use crate::errors::ExecResult;

/// Unions several upstream branches into one stream.
///
/// Whichever branch has a block ready is served first, so a stalled
/// branch never holds up the others. Each branch keeps its own order.
/// All branches must share one schema.
pub struct MergeTransform {
    name: String,
    ports: TransformPorts,
    schema: Option<Vec<ColumnDescriptor>>,
}

impl MergeTransform {
    pub fn new() -> Self {
        Self {
            name: "MergeTransform".to_string(),
            ports: TransformPorts::new(),
            schema: None,
        }
    }
}

impl Default for MergeTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for MergeTransform {
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
        match &self.schema {
            Some(schema) => block.check_schema(schema)?,
            None => self.schema = Some(block.schema()),
        }
        Ok(vec![block])
    }
}
