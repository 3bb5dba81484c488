//! Conditional execution graph.
//!
//! One run flows `Parsing → Barrier → Dispatch → Join → Aggregating → Done`.
//! The intent extractor fills the `RunState`, the router picks zero or more
//! tool nodes from a closed set, those nodes run concurrently as a task group,
//! and once every one of them has finished (or failed) the aggregator renders
//! whatever results exist into the final answer.

pub mod aggregate;
pub mod edge;
pub mod executor;
pub mod extract;
pub mod extractor;
pub mod node;
pub mod report;
pub mod router;
pub mod state;

pub use aggregate::aggregate;
pub use edge::{Edge, EdgeCondition, GraphDefinition, Step};
pub use executor::GraphExecutor;
pub use extractor::LlmIntentExtractor;
pub use node::{NodeContract, NodeError, NodeRegistry, ToolNode};
pub use report::RunReport;
pub use router::{route, Route};
pub use state::{
    BranchOutput, BranchResults, ExtractedParams, FailureKind, IntentFlags, NodeFailure,
    ParamField, ResultField, RunPhase, RunState,
};
