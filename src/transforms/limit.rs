//! OFFSET / LIMIT transform

use std::sync::Arc;

use super::{Transform, TransformKind, TransformPorts};
use crate::datablocks::BlockRef;
use crate::errors::ExecResult;

/// Skips `offset` rows, then passes through at most `limit` rows.
///
/// Reports `is_exhausted` as soon as the limit is reached so the pipeline
/// stops pulling from upstream.
pub struct LimitTransform {
    name: String,
    ports: TransformPorts,
    offset: u64,
    limit: u64,
    skipped: u64,
    emitted: u64,
}

impl LimitTransform {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            name: "LimitTransform".to_string(),
            ports: TransformPorts::new(),
            offset,
            limit,
            skipped: 0,
            emitted: 0,
        }
    }
}

impl Transform for LimitTransform {
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
        if self.is_exhausted() {
            return Ok(Vec::new());
        }
        let rows = block.num_rows() as u64;

        let skip = (self.offset - self.skipped).min(rows);
        self.skipped += skip;

        let take = (rows - skip).min(self.limit - self.emitted);
        if take == 0 {
            return Ok(Vec::new());
        }
        self.emitted += take;

        if skip == 0 && take == rows {
            return Ok(vec![block]);
        }
        Ok(vec![Arc::new(block.slice(skip as usize, take as usize))])
    }

    fn is_exhausted(&self) -> bool {
        self.emitted >= self.limit
    }
}
