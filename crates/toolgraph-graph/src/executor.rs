use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolgraph_core::config::GraphConfig;
use toolgraph_core::error::{Result, ToolgraphError};
use toolgraph_core::event::EventBus;
use toolgraph_core::traits::{IntentExtractor, ToolInvoker};
use toolgraph_core::types::{GraphEvent, NodeId};

use crate::aggregate::aggregate;
use crate::edge::{GraphDefinition, Step};
use crate::extract::{derive_flags, resolve_params};
use crate::node::{run_node, NodeError, NodeRegistry, ToolNode};
use crate::report::RunReport;
use crate::router::{route, Route};
use crate::state::{BranchOutput, FailureKind, NodeFailure, RunPhase, RunState};

type NodeOutcome = std::result::Result<std::result::Result<BranchOutput, NodeError>, Box<dyn Any + Send>>;

/// Drives one run through `Parsing -> Barrier -> Dispatch -> Join ->
/// Aggregating -> Done`.
///
/// The node registry, edge table and backends are fixed at construction and
/// shared read-only across runs; each run gets its own `RunState`.
pub struct GraphExecutor {
    definition: GraphDefinition,
    nodes: NodeRegistry,
    extractor: Arc<dyn IntentExtractor>,
    invoker: Arc<dyn ToolInvoker>,
    event_bus: Option<Arc<EventBus>>,
    config: GraphConfig,
}

impl GraphExecutor {
    /// Executor over the standard graph and node set.
    pub fn new(
        extractor: Arc<dyn IntentExtractor>,
        invoker: Arc<dyn ToolInvoker>,
        config: GraphConfig,
    ) -> Self {
        Self {
            definition: GraphDefinition::standard(),
            nodes: NodeRegistry::standard(&config),
            extractor,
            invoker,
            event_bus: None,
            config,
        }
    }

    pub fn with_nodes(mut self, nodes: NodeRegistry) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_definition(mut self, definition: GraphDefinition) -> Self {
        self.definition = definition;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Check the edge table against the node registry.
    pub fn validate(&self) -> Result<()> {
        self.definition.validate(&self.nodes)
    }

    /// Run one input to completion and summarize it.
    pub async fn run(&self, input: &str, cancel: CancellationToken) -> Result<RunReport> {
        let start = Instant::now();
        let state = self.run_state(input, cancel).await?;
        Ok(RunReport::from_state(&state, start.elapsed().as_millis() as u64))
    }

    /// Run one input and return the final state.
    ///
    /// Cancellation or the run deadline drops the in-flight run, which aborts
    /// every node task still running. No answer is produced in that case.
    pub async fn run_state(&self, input: &str, cancel: CancellationToken) -> Result<RunState> {
        let deadline = Duration::from_secs(self.config.run_timeout_secs);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Graph run cancelled");
                Err(ToolgraphError::Cancelled)
            }
            _ = tokio::time::sleep(deadline) => {
                warn!(timeout_secs = self.config.run_timeout_secs, "Graph run timed out");
                Err(ToolgraphError::RunTimeout(self.config.run_timeout_secs))
            }
            result = self.drive(input) => result,
        }
    }

    async fn drive(&self, input: &str) -> Result<RunState> {
        let start = Instant::now();
        let mut state = RunState::new(input);
        let run_id = state.run_id().clone();

        info!(run_id = %run_id, "Graph run started");
        self.publish(GraphEvent::RunStarted {
            run_id: run_id.clone(),
        });

        // Parsing
        self.enter(&mut state, RunPhase::Parsing);
        let extraction = self.extractor.extract(input).await.map_err(|e| match e {
            ToolgraphError::Extraction(_) => e,
            other => ToolgraphError::Extraction(other.to_string()),
        })?;
        let params = resolve_params(&extraction, input);
        let flags = derive_flags(&params, &extraction, input);
        debug!(run_id = %run_id, ?params, ?flags, "Intent resolved");
        state.set_intent(params, flags)?;

        // Barrier: routing only ever sees the complete flag set.
        self.traverse(Step::Parse, Step::Barrier)?;
        self.enter(&mut state, RunPhase::Barrier);

        // Dispatch
        self.enter(&mut state, RunPhase::Dispatch);
        let decision = route(&state.flags());
        let selected = self.resolve(&decision)?;
        state.set_dispatched(decision.nodes().to_vec())?;

        info!(run_id = %run_id, nodes = ?decision.nodes(), "Routed");
        self.publish(GraphEvent::Routed {
            run_id: run_id.clone(),
            nodes: decision.nodes().to_vec(),
        });

        if !selected.is_empty() {
            self.enter(&mut state, RunPhase::Join);
            self.fork_join(&mut state, selected).await;
        }

        // Aggregating
        self.enter(&mut state, RunPhase::Aggregating);
        let answer = aggregate(&state);
        state.set_final_answer(answer)?;
        self.traverse(Step::Aggregate, Step::End)?;
        self.enter(&mut state, RunPhase::Done);

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let partial = !state.failures().is_empty();
        info!(
            run_id = %run_id,
            dispatched = state.dispatched().len(),
            failed = state.failures().len(),
            elapsed_ms,
            "Graph run complete"
        );
        self.publish(GraphEvent::RunFinished {
            run_id,
            partial,
            elapsed_ms,
        });

        Ok(state)
    }

    /// Map the router's decision onto registered nodes reachable from the
    /// barrier. Anything else is a registry/edge-table mismatch.
    fn resolve(&self, decision: &Route) -> Result<Vec<(NodeId, Arc<dyn ToolNode>)>> {
        if let Route::Aggregate = decision {
            self.traverse(Step::Barrier, Step::Aggregate)?;
            return Ok(Vec::new());
        }

        decision
            .nodes()
            .iter()
            .map(|id| {
                if !self.definition.permits(Step::Barrier, Step::Tool(*id)) {
                    return Err(ToolgraphError::UnknownNode(id.to_string()));
                }
                let node = self
                    .nodes
                    .get(*id)
                    .ok_or_else(|| ToolgraphError::UnknownNode(id.to_string()))?;
                if node.contract().id != *id {
                    return Err(ToolgraphError::Integrity(format!(
                        "node registered as {} declares {}",
                        id,
                        node.contract().id
                    )));
                }
                Ok((*id, node))
            })
            .collect()
    }

    /// Start every selected node, then wait for all of them.
    ///
    /// Node outputs are merged here, on the single executor task, as they
    /// arrive.
    async fn fork_join(&self, state: &mut RunState, selected: Vec<(NodeId, Arc<dyn ToolNode>)>) {
        let params = Arc::new(state.params().cloned().unwrap_or_default());
        let timeout = Duration::from_secs(self.config.node_timeout_secs);
        let mut pending: BTreeSet<NodeId> = BTreeSet::new();
        let mut tasks: JoinSet<(NodeId, NodeOutcome, u64)> = JoinSet::new();

        for (id, node) in selected {
            let params = params.clone();
            let invoker = self.invoker.clone();
            pending.insert(id);

            debug!(node = %id, "Dispatching node");
            self.publish(GraphEvent::NodeStarted {
                run_id: state.run_id().clone(),
                node: id,
            });

            tasks.spawn(async move {
                let started = Instant::now();
                let outcome = AssertUnwindSafe(run_node(
                    node.as_ref(),
                    &params,
                    invoker.as_ref(),
                    timeout,
                ))
                .catch_unwind()
                .await;
                (id, outcome, started.elapsed().as_millis() as u64)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (id, outcome, elapsed_ms) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "Node task ended abnormally");
                    continue;
                }
            };
            pending.remove(&id);

            let merged = match outcome {
                Ok(Ok(output)) => state.record_output(id, output),
                Ok(Err(e)) => Err(e.into_failure(id)),
                Err(panic) => Err(NodeFailure {
                    node: id,
                    kind: FailureKind::Panicked,
                    message: panic_message(panic.as_ref()),
                }),
            };

            match merged {
                Ok(()) => {
                    debug!(node = %id, elapsed_ms, "Node complete");
                    self.publish(GraphEvent::NodeFinished {
                        run_id: state.run_id().clone(),
                        node: id,
                        elapsed_ms,
                    });
                }
                Err(failure) => self.fail(state, failure),
            }
        }

        for id in pending {
            self.fail(
                state,
                NodeFailure {
                    node: id,
                    kind: FailureKind::Panicked,
                    message: "node task ended without reporting".into(),
                },
            );
        }
    }

    fn fail(&self, state: &mut RunState, failure: NodeFailure) {
        warn!(
            node = %failure.node,
            kind = ?failure.kind,
            error = %failure.message,
            "Node failed"
        );
        self.publish(GraphEvent::NodeFailed {
            run_id: state.run_id().clone(),
            node: failure.node,
            error: failure.message.clone(),
        });
        state.record_failure(failure);
    }

    fn traverse(&self, from: Step, to: Step) -> Result<()> {
        if self.definition.permits(from, to) {
            Ok(())
        } else {
            Err(ToolgraphError::Integrity(format!(
                "no edge {:?} -> {:?}",
                from, to
            )))
        }
    }

    fn enter(&self, state: &mut RunState, phase: RunPhase) {
        debug!(run_id = %state.run_id(), ?phase, "Phase");
        state.enter(phase);
    }

    fn publish(&self, event: GraphEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("node panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("node panicked: {}", s)
    } else {
        "node panicked".to_string()
    }
}
