use serde::Serialize;

use toolgraph_core::types::NodeId;

use crate::state::IntentFlags;

/// Routing decision taken once per run, after the barrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "route", content = "nodes")]
pub enum Route {
    /// Nothing requested: go straight to the aggregator.
    Aggregate,
    /// Fan out to these nodes, in declaration order.
    Dispatch(Vec<NodeId>),
}

impl Route {
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Self::Aggregate => &[],
            Self::Dispatch(nodes) => nodes,
        }
    }
}

/// Select every node whose intent flag is set.
pub fn route(flags: &IntentFlags) -> Route {
    let nodes: Vec<NodeId> = NodeId::ALL
        .iter()
        .copied()
        .filter(|id| flags.wants(*id))
        .collect();

    if nodes.is_empty() {
        Route::Aggregate
    } else {
        Route::Dispatch(nodes)
    }
}
