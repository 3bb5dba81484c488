use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use toolgraph_graph::GraphExecutor;

/// Shared application state for axum handlers.
pub struct AppState {
    pub executor: Arc<GraphExecutor>,
    /// Operations served by the tool backend, for `/api/tools`.
    pub operations: Vec<String>,
    /// Parent of every per-request run token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}
