use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use toolgraph_core::config::GatewayConfig;
use toolgraph_core::error::ToolgraphError;
use toolgraph_graph::GraphExecutor;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    executor: Arc<GraphExecutor>,
    operations: Vec<String>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, executor: Arc<GraphExecutor>, operations: Vec<String>) -> Self {
        Self {
            config,
            executor,
            operations,
        }
    }

    fn router(&self, shutdown: CancellationToken) -> Router {
        let state = Arc::new(AppState {
            executor: self.executor.clone(),
            operations: self.operations.clone(),
            shutdown,
        });

        Router::new()
            .route("/api/health", get(routes::health))
            .route("/api/tools", get(routes::list_tools))
            .route("/tools", post(routes::run_tools))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = self.router(shutdown.clone());

        let listener = TcpListener::bind(&self.config.bind).await.map_err(|e| {
            ToolgraphError::Gateway(format!("failed to bind {}: {}", self.config.bind, e))
        })?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use toolgraph_core::config::GraphConfig;
    use toolgraph_test_utils::{MockInvoker, StaticExtractor};

    fn server(extractor: StaticExtractor) -> GatewayServer {
        let executor = GraphExecutor::new(
            Arc::new(extractor),
            Arc::new(MockInvoker::standard()),
            GraphConfig::default(),
        );
        GatewayServer::new(
            GatewayConfig::default(),
            Arc::new(executor),
            vec!["reverse_string".into()],
        )
    }

    fn post_query(query: &str) -> Request<Body> {
        Request::post("/tools")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({ "query": query }).to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = server(StaticExtractor::empty()).router(CancellationToken::new());
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_query_returns_report() {
        let app = server(StaticExtractor::empty()).router(CancellationToken::new());
        let response = app.oneshot(post_query("reverse 'hello world'")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let report = body_json(response).await;
        assert_eq!(report["final_answer"], "Reversed text: dlrow olleh");
        assert_eq!(report["dispatched"], serde_json::json!(["reverse_text"]));
        assert_eq!(report["branch_outputs"]["reverse_text"], "dlrow olleh");
        assert_eq!(report["partial"], false);
    }

    #[tokio::test]
    async fn test_extraction_failure_maps_to_bad_gateway() {
        let app = server(StaticExtractor::failing("down")).router(CancellationToken::new());
        let response = app.oneshot(post_query("reverse 'x'")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("down"));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let app = server(StaticExtractor::empty()).router(CancellationToken::new());
        let response = app.oneshot(post_query("   ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unbindable_address_is_gateway_error() {
        let executor = GraphExecutor::new(
            Arc::new(StaticExtractor::empty()),
            Arc::new(MockInvoker::standard()),
            GraphConfig::default(),
        );
        let config = GatewayConfig {
            bind: "not-an-address".into(),
        };
        let server = GatewayServer::new(config, Arc::new(executor), Vec::new());

        let err = server.run(CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().starts_with("Gateway error: failed to bind not-an-address"));
    }
}
