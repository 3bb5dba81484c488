use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use toolgraph_core::error::ToolgraphError;
use toolgraph_graph::RunReport;

use crate::state::AppState;

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /api/tools
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "operations": state.operations }))
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

type ErrorResponse = (StatusCode, Json<serde_json::Value>);

// POST /tools
pub async fn run_tools(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<RunReport>, ErrorResponse> {
    if body.query.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "query must not be empty"));
    }

    // Dropped if the client goes away, which also drops the run.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    match state.executor.run(&body.query, cancel).await {
        Ok(report) => {
            info!(
                run_id = %report.run_id,
                dispatched = report.dispatched.len(),
                partial = report.partial,
                "Query answered"
            );
            Ok(Json(report))
        }
        Err(e) => {
            warn!(error = %e, "Run failed");
            Err(error_response(status_for(&e), &e.to_string()))
        }
    }
}

fn status_for(error: &ToolgraphError) -> StatusCode {
    match error {
        ToolgraphError::Extraction(_) => StatusCode::BAD_GATEWAY,
        ToolgraphError::RunTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ToolgraphError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: &str) -> ErrorResponse {
    (status, Json(serde_json::json!({ "error": message })))
}
