use std::collections::BTreeMap;

use serde::Serialize;

use toolgraph_core::types::{NodeId, RunId};

use crate::state::{NodeFailure, RunPhase, RunState};

/// What a caller receives from a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub final_answer: String,
    pub dispatched: Vec<NodeId>,
    pub succeeded: Vec<NodeId>,
    pub failures: Vec<NodeFailure>,
    /// True when at least one dispatched node failed.
    pub partial: bool,
    /// Raw result of each successful branch, keyed by the node that wrote it.
    pub branch_outputs: BTreeMap<NodeId, serde_json::Value>,
    pub phases: Vec<RunPhase>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn from_state(state: &RunState, elapsed_ms: u64) -> Self {
        let branch_outputs = state
            .results()
            .raw()
            .into_iter()
            .map(|(field, value)| (field.owner(), value))
            .collect();

        let mut succeeded = state.succeeded().to_vec();
        succeeded.sort();
        let mut failures = state.failures().to_vec();
        failures.sort_by_key(|f| f.node);

        Self {
            run_id: state.run_id().clone(),
            final_answer: state.final_answer().unwrap_or_default().to_string(),
            dispatched: state.dispatched().to_vec(),
            partial: !failures.is_empty(),
            succeeded,
            failures,
            branch_outputs,
            phases: state.phases().to_vec(),
            elapsed_ms,
        }
    }
}
