//! Logical plan nodes consumed by the executors
//!
//! Plans are built and validated upstream. This module only defines the
//! node set and its printable forms.
//!
//! # Sort Key Priority
//!
//! Order specifications in an `OrderByPlan` are evaluated left to right:
//! the first key is primary, later keys only break ties. Direction is
//! per key.

mod explain;
mod plan;

pub use explain::ExplainNode;
pub use plan::{
    LimitPlan, OrderByPlan, OrderPlan, PlanNode, ProjectionPlan, SortDirection, VariablePlan,
};
