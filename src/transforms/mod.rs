//! Transforms: the streaming stages of a pipeline
//!
//! A transform owns its ports and turns input blocks into output blocks.
//! The pipeline drives every transform the same way:
//!
//! 1. Pull the next ready block from any input (round-robin among ready ones)
//! 2. Hand it to `consume`, push every returned block downstream
//! 3. Repeat until the inputs are exhausted or the transform reports
//!    `is_exhausted`
//! 4. Call `drain` until it yields nothing, pushing each block
//!
//! Cancellation is checked before every pull and every push, so a
//! materializing transform is interruptible while it buffers. A drain that
//! reports `blocking_drain` runs on the blocking pool while the worker keeps
//! watching for cancellation.

mod limit;
mod merge;
mod port;
mod projection;
mod sink;
mod sort;
mod source;

pub use limit::LimitTransform;
pub use merge::MergeTransform;
pub use port::{connect, InputPort, OutputPort, TransformPorts};
pub(crate) use port::FanIn;
pub use projection::ProjectionTransform;
pub use sink::SinkTransform;
pub use sort::{sort_indices, OrderByTransform, SortKey, SortPhase};
pub use source::{BlockInputStream, DataSourceTransform, MemoryBlockStream};

use std::fmt;

use crate::datablocks::BlockRef;
use crate::errors::{ExecError, ExecResult};

/// How a transform relates input to output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// No inputs; produces everything from `drain`
    Source,
    /// Emits for every input block with O(1) buffering
    Streaming,
    /// Consumes all input before emitting anything
    Materializing,
    /// Terminal stage feeding the pipeline's consumer
    Sink,
}

impl TransformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::Source => "source",
            TransformKind::Streaming => "streaming",
            TransformKind::Materializing => "materializing",
            TransformKind::Sink => "sink",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pluggable unit of streaming computation
pub trait Transform: Send {
    /// Name used for tracing and error attribution
    fn name(&self) -> &str;

    fn kind(&self) -> TransformKind;

    fn ports(&self) -> &TransformPorts;

    fn ports_mut(&mut self) -> &mut TransformPorts;

    /// Processes one input block, returning zero or more output blocks
    fn consume(&mut self, block: BlockRef) -> ExecResult<Vec<BlockRef>> {
        let _ = block;
        Err(ExecError::execution(format!("{} accepts no input", self.name())))
    }

    /// Yields remaining output after the inputs are exhausted
    fn drain(&mut self) -> ExecResult<Option<BlockRef>> {
        Ok(None)
    }

    /// True once the transform needs no further input
    fn is_exhausted(&self) -> bool {
        false
    }

    /// True when the next `drain` is CPU-bound and belongs on the blocking
    /// pool rather than an async worker
    fn blocking_drain(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("inputs", &self.ports().inputs.len())
            .field("consumers", &self.ports().output.consumers())
            .finish()
    }
}
