//! Executors: compile logical plan nodes into wired transforms
//!
//! An executor owns one plan node and the session's `ExecutorContext`.
//! `compile` builds the node's transform and connects it to the supplied
//! upstream; it fails only for structurally invalid nodes.
//!
//! Every executor renders a deterministic description:
//!
//! ```text
//! -> OrderByExecutor
//!     -> OrderByNode [(field:name, direction:asc)(field:age, direction:desc)]
//! ```

mod context;
mod limit;
mod orderby;
mod projection;

pub use context::ExecutorContext;
pub use limit::LimitExecutor;
pub use orderby::OrderByExecutor;
pub use projection::ProjectionExecutor;

use std::fmt;
use std::sync::Arc;

use crate::errors::{ExecError, ExecResult};
use crate::observability::{log_event_with_fields, Event};
use crate::pipeline::Pipeline;
use crate::planner::{ExplainNode, PlanNode};
use crate::transforms::{connect, SinkTransform, Transform};

/// Compiles one plan node into a transform
pub trait Executor: fmt::Display + Send {
    fn name(&self) -> &'static str;

    /// The plan node this executor compiles
    fn plan(&self) -> PlanNode;

    /// Builds the transform and wires `upstream` into it
    fn compile(&self, upstream: &mut dyn Transform) -> ExecResult<Box<dyn Transform>>;

    fn explain(&self) -> ExplainNode {
        ExplainNode::new(self.name()).with_child(ExplainNode::new(self.plan().to_string()))
    }
}

/// Returns the executor for `plan`
pub fn executor_for(ctx: &ExecutorContext, plan: &PlanNode) -> ExecResult<Box<dyn Executor>> {
    match plan {
        PlanNode::OrderBy(p) => Ok(Box::new(OrderByExecutor::new(ctx.clone(), p.clone()))),
        PlanNode::Limit(p) => Ok(Box::new(LimitExecutor::new(ctx.clone(), *p))),
        PlanNode::Projection(p) => Ok(Box::new(ProjectionExecutor::new(ctx.clone(), p.clone()))),
        other => Err(ExecError::plan_compilation(format!(
            "no executor for {}",
            other.name()
        ))),
    }
}

/// A pipeline ready to `run`, with the description of its executors
#[derive(Debug)]
pub struct CompiledPipeline {
    pub pipeline: Pipeline,
    pub explain: Vec<ExplainNode>,
}

impl CompiledPipeline {
    /// Executor descriptions, one tree per plan node, in plan order
    pub fn description(&self) -> String {
        self.explain
            .iter()
            .map(|node| node.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Compiles `plans` in order on top of `source` and terminates the chain
/// with a sink.
///
/// The pipeline shares the context's metrics and is cancelled with the
/// context's token.
pub fn build_pipeline(
    ctx: &ExecutorContext,
    source: Box<dyn Transform>,
    plans: &[PlanNode],
) -> ExecResult<CompiledPipeline> {
    let mut pipeline = Pipeline::with_parent(&ctx.cancel)
        .with_metrics(Arc::clone(&ctx.metrics))
        .with_result_capacity(ctx.config.port_capacity);
    let mut explain = Vec::with_capacity(plans.len());

    let mut current = source;
    for plan in plans {
        let executor = executor_for(ctx, plan)?;
        let next = executor.compile(current.as_mut())?;
        explain.push(executor.explain());
        pipeline.add(current);
        current = next;
    }

    let mut sink = SinkTransform::default();
    connect(current.as_mut(), &mut sink, ctx.config.port_capacity);
    pipeline.add(current);
    pipeline.add(Box::new(sink));

    Ok(CompiledPipeline { pipeline, explain })
}

fn log_compiled(ctx: &ExecutorContext, executor: &str) {
    let session_id = ctx.session_id.to_string();
    log_event_with_fields(
        Event::ExecutorCompiled,
        &[("executor", executor), ("session_id", session_id.as_str())],
    );
}
