//! ORDER BY executor

use std::fmt;
use std::sync::Arc;

use super::{log_compiled, Executor, ExecutorContext};
use crate::errors::{ExecError, ExecResult};
use crate::planner::{OrderByPlan, PlanNode};
use crate::transforms::{connect, OrderByTransform, SortKey, Transform};

/// Compiles an `OrderByPlan` into an `OrderByTransform`
#[derive(Debug, Clone)]
pub struct OrderByExecutor {
    ctx: ExecutorContext,
    plan: OrderByPlan,
}

impl OrderByExecutor {
    pub fn new(ctx: ExecutorContext, plan: OrderByPlan) -> Self {
        Self { ctx, plan }
    }

    /// Resolves each order specification to a named key, in priority order
    pub fn sort_keys(&self) -> ExecResult<Vec<SortKey>> {
        if self.plan.orders.is_empty() {
            return Err(ExecError::plan_compilation(
                "ORDER BY requires at least one order specification",
            ));
        }
        self.plan
            .orders
            .iter()
            .map(|order| match order.field() {
                Some(field) => Ok(SortKey::new(field, order.direction)),
                None => Err(ExecError::plan_compilation(format!(
                    "order key {} is not a column reference",
                    order.expression
                ))),
            })
            .collect()
    }
}

impl Executor for OrderByExecutor {
    fn name(&self) -> &'static str {
        "OrderByExecutor"
    }

    fn plan(&self) -> PlanNode {
        PlanNode::OrderBy(self.plan.clone())
    }

    fn compile(&self, upstream: &mut dyn Transform) -> ExecResult<Box<dyn Transform>> {
        let keys = self.sort_keys()?;
        let mut sort = OrderByTransform::new(keys, self.ctx.config.max_block_rows)
            .with_metrics(Arc::clone(&self.ctx.metrics));
        connect(upstream, &mut sort, self.ctx.config.port_capacity);
        log_compiled(&self.ctx, self.name());
        Ok(Box::new(sort))
    }
}

impl fmt::Display for OrderByExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.explain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::planner::{OrderPlan, SortDirection};
    use crate::transforms::{DataSourceTransform, TransformKind};

    fn executor(orders: Vec<OrderPlan>) -> OrderByExecutor {
        OrderByExecutor::new(ExecutorContext::default(), OrderByPlan::new(orders))
    }

    #[test]
    fn test_description() {
        let exec = executor(vec![OrderPlan::asc("name"), OrderPlan::desc("age")]);
        assert_eq!(
            exec.to_string(),
            "-> OrderByExecutor\n    -> OrderByNode [(field:name, direction:asc)(field:age, direction:desc)]"
        );
    }

    #[test]
    fn test_compile_wires_upstream() {
        let exec = executor(vec![OrderPlan::asc("name")]);
        let mut source = DataSourceTransform::from_blocks(Vec::new());
        let sort = exec.compile(&mut source).unwrap();

        assert_eq!(sort.kind(), TransformKind::Materializing);
        assert_eq!(sort.ports().inputs.len(), 1);
        assert!(source.ports().output.is_connected());
    }

    #[test]
    fn test_empty_orders_rejected() {
        let mut source = DataSourceTransform::from_blocks(Vec::new());
        let err = executor(Vec::new()).compile(&mut source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlanCompilation);
    }

    #[test]
    fn test_non_variable_key_rejected() {
        let order = OrderPlan::new(PlanNode::limit(0, 1), SortDirection::Asc);
        let err = executor(vec![order]).sort_keys().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlanCompilation);
    }
}
