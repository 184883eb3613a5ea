//! LIMIT executor

use std::fmt;

use super::{log_compiled, Executor, ExecutorContext};
use crate::errors::ExecResult;
use crate::planner::{LimitPlan, PlanNode};
use crate::transforms::{connect, LimitTransform, Transform};

#[derive(Debug, Clone)]
pub struct LimitExecutor {
    ctx: ExecutorContext,
    plan: LimitPlan,
}

impl LimitExecutor {
    pub fn new(ctx: ExecutorContext, plan: LimitPlan) -> Self {
        Self { ctx, plan }
    }
}

impl Executor for LimitExecutor {
    fn name(&self) -> &'static str {
        "LimitExecutor"
    }

    fn plan(&self) -> PlanNode {
        PlanNode::Limit(self.plan)
    }

    fn compile(&self, upstream: &mut dyn Transform) -> ExecResult<Box<dyn Transform>> {
        let mut limit = LimitTransform::new(self.plan.offset, self.plan.limit);
        connect(upstream, &mut limit, self.ctx.config.port_capacity);
        log_compiled(&self.ctx, self.name());
        Ok(Box::new(limit))
    }
}

impl fmt::Display for LimitExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.explain())
    }
}
