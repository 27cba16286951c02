use serde::Serialize;

use crate::model::NodeId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathResult {
    pub path: Vec<NodeId>,
    #[serde(rename = "cost")]
    pub total_cost: f64,
}

impl PathResult {
    pub fn stay(node: NodeId) -> Self {
        Self {
            path: vec![node],
            total_cost: 0.0,
        }
    }

    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Human-readable record of the steps a search took. Observational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DecisionTrace(Vec<String>);

impl DecisionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        self.0.push(entry.into());
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.iter().any(|entry| entry.contains(needle))
    }
}

/// `best` is `None` when the destination is unreachable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOutcome {
    pub best: Option<PathResult>,
    #[serde(rename = "logs")]
    pub trace: DecisionTrace,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid {role} node '{node}'; valid nodes: {valid:?}")]
    InvalidNode {
        role: &'static str,
        node: NodeId,
        valid: Vec<String>,
    },

    #[error("predecessor chain from {dest} does not lead back to {start}")]
    BrokenPredecessorChain { start: NodeId, dest: NodeId },
}
