//! Source transforms

use std::collections::VecDeque;
use std::sync::Arc;

use super::{Transform, TransformKind, TransformPorts};
use crate::datablocks::{BlockRef, ColumnDescriptor, DataBlock};
use crate::errors::ExecResult;

/// A pull-based reader of data blocks
pub trait BlockInputStream: Send {
    fn name(&self) -> &str;

    /// Returns the next block, or `None` once the stream is exhausted
    fn read(&mut self) -> ExecResult<Option<DataBlock>>;
}

/// An in-memory block stream
#[derive(Debug, Default)]
pub struct MemoryBlockStream {
    blocks: VecDeque<DataBlock>,
}

impl MemoryBlockStream {
    pub fn new(blocks: Vec<DataBlock>) -> Self {
        Self {
            blocks: blocks.into(),
        }
    }
}

impl BlockInputStream for MemoryBlockStream {
    fn name(&self) -> &str {
        "MemoryBlockStream"
    }

    fn read(&mut self) -> ExecResult<Option<DataBlock>> {
        Ok(self.blocks.pop_front())
    }
}

/// Publishes the blocks of a `BlockInputStream`.
///
/// Every block must share the schema of the first one.
pub struct DataSourceTransform {
    name: String,
    ports: TransformPorts,
    stream: Box<dyn BlockInputStream>,
    schema: Option<Vec<ColumnDescriptor>>,
}

impl DataSourceTransform {
    pub fn new(stream: impl BlockInputStream + 'static) -> Self {
        Self {
            name: "DataSourceTransform".to_string(),
            ports: TransformPorts::new(),
            stream: Box::new(stream),
            schema: None,
        }
    }

    /// Creates a source over in-memory blocks
    pub fn from_blocks(blocks: Vec<DataBlock>) -> Self {
        Self::new(MemoryBlockStream::new(blocks))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Transform for DataSourceTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransformKind {
        TransformKind::Source
    }

    fn ports(&self) -> &TransformPorts {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut TransformPorts {
        &mut self.ports
    }

    fn drain(&mut self) -> ExecResult<Option<BlockRef>> {
        let Some(block) = self.stream.read()? else {
            return Ok(None);
        };
        match &self.schema {
            Some(schema) => block.check_schema(schema)?,
            None => self.schema = Some(block.schema()),
        }
        Ok(Some(Arc::new(block)))
    }
}
