//! Executor explain output
//!
//! Produces a deterministic, indented tree: one `-> label` line per node,
//! children indented four spaces below their parent.

use std::fmt;

/// A node of the explain tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainNode {
    label: String,
    children: Vec<ExplainNode>,
}

impl ExplainNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    /// Appends a child node
    pub fn with_child(mut self, child: ExplainNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn children(&self) -> &[ExplainNode] {
        &self.children
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        if depth > 0 {
            writeln!(f)?;
        }
        write!(f, "{:indent$}-> {}", "", self.label, indent = depth * 4)?;
        for child in &self.children {
            child.render(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ExplainNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}
