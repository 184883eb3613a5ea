//! Logical plan nodes
//!
//! Plans arrive already validated. Every node renders through `Display`,
//! which is pure and deterministic.

use std::fmt;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// Parses `asc` / `desc`, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to a column by identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariablePlan {
    pub name: String,
}

impl VariablePlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One sort key: an expression and its direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlan {
    pub expression: Box<PlanNode>,
    pub direction: SortDirection,
}

impl OrderPlan {
    pub fn new(expression: PlanNode, direction: SortDirection) -> Self {
        Self {
            expression: Box::new(expression),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(PlanNode::variable(column), SortDirection::Asc)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(PlanNode::variable(column), SortDirection::Desc)
    }

    /// Returns the column name this key sorts on, if it is a variable reference
    pub fn field(&self) -> Option<&str> {
        match self.expression.as_ref() {
            PlanNode::Variable(v) => Some(&v.name),
            _ => None,
        }
    }
}

/// Sort keys, highest priority first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByPlan {
    pub orders: Vec<OrderPlan>,
}

impl OrderByPlan {
    pub fn new(orders: Vec<OrderPlan>) -> Self {
        Self { orders }
    }
}

/// Skip `offset` rows, then pass at most `limit` rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPlan {
    pub offset: u64,
    pub limit: u64,
}

impl LimitPlan {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }
}

/// Select and reorder columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionPlan {
    pub projections: Vec<PlanNode>,
}

impl ProjectionPlan {
    pub fn new(projections: Vec<PlanNode>) -> Self {
        Self { projections }
    }
}

/// Logical plan node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanNode {
    Variable(VariablePlan),
    Order(OrderPlan),
    OrderBy(OrderByPlan),
    Limit(LimitPlan),
    Projection(ProjectionPlan),
}

impl PlanNode {
    pub fn variable(name: impl Into<String>) -> Self {
        PlanNode::Variable(VariablePlan::new(name))
    }

    pub fn order_by(orders: Vec<OrderPlan>) -> Self {
        PlanNode::OrderBy(OrderByPlan::new(orders))
    }

    pub fn limit(offset: u64, limit: u64) -> Self {
        PlanNode::Limit(LimitPlan::new(offset, limit))
    }

    pub fn projection<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PlanNode::Projection(ProjectionPlan::new(
            columns.into_iter().map(PlanNode::variable).collect(),
        ))
    }

    /// Returns the node name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            PlanNode::Variable(_) => "VariableNode",
            PlanNode::Order(_) => "OrderNode",
            PlanNode::OrderBy(_) => "OrderByNode",
            PlanNode::Limit(_) => "LimitNode",
            PlanNode::Projection(_) => "ProjectionNode",
        }
    }
}

impl fmt::Display for OrderPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field() {
            Some(field) => write!(f, "(field:{}, direction:{})", field, self.direction),
            None => write!(f, "(field:{}, direction:{})", self.expression, self.direction),
        }
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanNode::Variable(v) => write!(f, "{}=[${}]", self.name(), v.name),
            PlanNode::Order(order) => write!(f, "{} {}", self.name(), order),
            PlanNode::OrderBy(plan) => {
                write!(f, "{} [", self.name())?;
                for order in &plan.orders {
                    write!(f, "{}", order)?;
                }
                write!(f, "]")
            }
            PlanNode::Limit(plan) => write!(
                f,
                "{} [offset:{}, limit:{}]",
                self.name(),
                plan.offset,
                plan.limit
            ),
            PlanNode::Projection(plan) => {
                let fields: Vec<String> = plan
                    .projections
                    .iter()
                    .map(|p| match p {
                        PlanNode::Variable(v) => v.name.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                write!(f, "{} [{}]", self.name(), fields.join(", "))
            }
        }
    }
}
