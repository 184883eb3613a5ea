//! Observable pipeline events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Pipeline lifecycle
    /// All transforms spawned
    PipelineStart,
    /// Sink reached end of stream and every transform finished
    PipelineComplete,
    /// A transform or the consumer failed
    PipelineFailed,
    /// Cancelled explicitly or by the parent token
    PipelineCancelled,

    // Transform lifecycle
    /// Transform task started
    TransformStart,
    /// Transform finished normally
    TransformFinish,
    /// Transform raised an error
    TransformFailed,
    /// Transform observed cancellation
    TransformCancelled,
    /// One block pushed to the output port
    BlockEmitted,

    // Executors
    /// Plan node compiled into a transform
    ExecutorCompiled,
    /// Sort buffering finished, sorting begins
    SortBegin,
    /// Sorted rows are ready to drain
    SortComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::PipelineStart => "PIPELINE_START",
            Event::PipelineComplete => "PIPELINE_COMPLETE",
            Event::PipelineFailed => "PIPELINE_FAILED",
            Event::PipelineCancelled => "PIPELINE_CANCELLED",

            Event::TransformStart => "TRANSFORM_START",
            Event::TransformFinish => "TRANSFORM_FINISH",
            Event::TransformFailed => "TRANSFORM_FAILED",
            Event::TransformCancelled => "TRANSFORM_CANCELLED",
            Event::BlockEmitted => "BLOCK_EMITTED",

            Event::ExecutorCompiled => "EXECUTOR_COMPILED",
            Event::SortBegin => "SORT_BEGIN",
            Event::SortComplete => "SORT_COMPLETE",
        }
    }

    /// Returns the severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::PipelineFailed | Event::TransformFailed => Severity::Error,
            Event::PipelineCancelled | Event::TransformCancelled => Severity::Warn,
            Event::BlockEmitted => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
