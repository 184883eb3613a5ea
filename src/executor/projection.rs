//! Projection executor

use std::fmt;

use super::{log_compiled, Executor, ExecutorContext};
use crate::errors::{ExecError, ExecResult};
use crate::planner::{PlanNode, ProjectionPlan};
use crate::transforms::{connect, ProjectionTransform, Transform};

#[derive(Debug, Clone)]
pub struct ProjectionExecutor {
    ctx: ExecutorContext,
    plan: ProjectionPlan,
}

impl ProjectionExecutor {
    pub fn new(ctx: ExecutorContext, plan: ProjectionPlan) -> Self {
        Self { ctx, plan }
    }

    fn columns(&self) -> ExecResult<Vec<String>> {
        if self.plan.projections.is_empty() {
            return Err(ExecError::plan_compilation("projection selects no columns"));
        }
        self.plan
            .projections
            .iter()
            .map(|node| match node {
                PlanNode::Variable(v) => Ok(v.name.clone()),
                other => Err(ExecError::plan_compilation(format!(
                    "projection of {} is not supported",
                    other
                ))),
            })
            .collect()
    }
}

impl Executor for ProjectionExecutor {
    fn name(&self) -> &'static str {
        "ProjectionExecutor"
    }

    fn plan(&self) -> PlanNode {
        PlanNode::Projection(self.plan.clone())
    }

    fn compile(&self, upstream: &mut dyn Transform) -> ExecResult<Box<dyn Transform>> {
        let mut projection = ProjectionTransform::new(self.columns()?);
        connect(upstream, &mut projection, self.ctx.config.port_capacity);
        log_compiled(&self.ctx, self.name());
        Ok(Box::new(projection))
    }
}

impl fmt::Display for ProjectionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.explain())
    }
}
