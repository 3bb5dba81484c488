use serde::Serialize;

use toolgraph_core::error::{Result, ToolgraphError};
use toolgraph_core::types::NodeId;

use crate::node::NodeRegistry;

/// A position in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "node", rename_all = "snake_case")]
pub enum Step {
    Parse,
    Barrier,
    Tool(NodeId),
    Aggregate,
    End,
}

/// Condition for traversing an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCondition {
    /// Always traverse this edge.
    #[default]
    Always,
    /// Traverse only if the router selected the target.
    Routed,
}

/// An edge connecting two steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: Step,
    pub to: Step,
    pub condition: EdgeCondition,
}

impl Edge {
    /// Create an unconditional edge.
    pub fn always(from: Step, to: Step) -> Self {
        Self {
            from,
            to,
            condition: EdgeCondition::Always,
        }
    }

    /// Create an edge taken only on the router's say-so.
    pub fn routed(from: Step, to: Step) -> Self {
        Self {
            from,
            to,
            condition: EdgeCondition::Routed,
        }
    }
}

/// Edge table of a parse, fan-out, join graph.
///
/// The only shape supported: `Parse -> Barrier`, a routed edge from the
/// barrier to each branch (plus the empty-route shortcut to `Aggregate`),
/// each branch joining at `Aggregate`, then `End`.
#[derive(Debug, Clone, Serialize)]
pub struct GraphDefinition {
    branches: Vec<NodeId>,
    edges: Vec<Edge>,
}

impl GraphDefinition {
    pub fn two_level(branches: &[NodeId]) -> Self {
        let mut branches = branches.to_vec();
        branches.sort();
        branches.dedup();

        let mut edges = vec![
            Edge::always(Step::Parse, Step::Barrier),
            Edge::routed(Step::Barrier, Step::Aggregate),
        ];
        for id in &branches {
            edges.push(Edge::routed(Step::Barrier, Step::Tool(*id)));
            edges.push(Edge::always(Step::Tool(*id), Step::Aggregate));
        }
        edges.push(Edge::always(Step::Aggregate, Step::End));

        Self { branches, edges }
    }

    /// The standard graph over every known node.
    pub fn standard() -> Self {
        Self::two_level(&NodeId::ALL)
    }

    pub fn branches(&self) -> &[NodeId] {
        &self.branches
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Whether the edge table has an edge `from -> to`.
    pub fn permits(&self, from: Step, to: Step) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    /// Check every branch has a node implementation.
    pub fn validate(&self, nodes: &NodeRegistry) -> Result<()> {
        match self.branches.iter().find(|id| !nodes.contains(**id)) {
            Some(missing) => Err(ToolgraphError::UnknownNode(missing.to_string())),
            None => Ok(()),
        }
    }
}

impl Default for GraphDefinition {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgraph_core::config::GraphConfig;

    #[test]
    fn test_two_level_shape() {
        let graph = GraphDefinition::two_level(&[NodeId::Countdown, NodeId::ReverseText]);
        assert_eq!(graph.branches(), &[NodeId::ReverseText, NodeId::Countdown]);
        assert!(graph.permits(Step::Parse, Step::Barrier));
        assert!(graph.permits(Step::Barrier, Step::Tool(NodeId::Countdown)));
        assert!(graph.permits(Step::Tool(NodeId::Countdown), Step::Aggregate));
        assert!(graph.permits(Step::Barrier, Step::Aggregate));
        assert!(graph.permits(Step::Aggregate, Step::End));
        assert!(!graph.permits(Step::Barrier, Step::Tool(NodeId::PageTitle)));
        assert!(!graph.permits(Step::Parse, Step::Tool(NodeId::Countdown)));
    }

    #[test]
    fn test_routed_edges_only_leave_the_barrier() {
        let graph = GraphDefinition::standard();
        for edge in graph.edges() {
            if edge.condition == EdgeCondition::Routed {
                assert_eq!(edge.from, Step::Barrier);
            }
        }
    }

    #[test]
    fn test_validate_against_registry() {
        let graph = GraphDefinition::standard();
        assert!(graph
            .validate(&NodeRegistry::standard(&GraphConfig::default()))
            .is_ok());

        let err = graph.validate(&NodeRegistry::new()).unwrap_err();
        assert!(matches!(err, ToolgraphError::UnknownNode(_)));
    }
}
