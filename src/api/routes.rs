//! API Routes
//!
//! HTTP endpoints for health checks, indexer status, stored nodes,
//! metrics, and manually triggering an indexing run.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::IndexerMetrics;
use crate::config::IndexerConfig;
use crate::indexer::Indexer;
use crate::store::NodeStore;
use crate::types::Network;

/// Most nodes returned by the listing endpoint
const MAX_NODES_IN_RESPONSE: usize = 100;

/// Shared API state
pub struct ApiState {
    pub config: Arc<IndexerConfig>,
    pub store: Arc<dyn NodeStore>,
    pub indexer: Arc<Indexer>,
    pub metrics: Arc<IndexerMetrics>,
}

/// Build the API router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        // Health & status
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        // Stored nodes
        .route("/nodes", get(get_nodes))
        // Metrics
        .route("/metrics", get(get_metrics_prometheus))
        .route("/metrics/json", get(get_metrics_json))
        // Manual trigger
        .route("/runs/:network", post(trigger_run))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_api_server(state: Arc<ApiState>) -> anyhow::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], state.config.api_port));
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("HTTP API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health - Simple health check
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// GET /status - Indexer phase, last run report and store counts
async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let status = state.indexer.status().await;
    let node_count = state.store.list_nodes().await.map(|n| n.len()).unwrap_or(0);
    let snapshot_count = state.store.snapshot_count().await.unwrap_or(0);

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.metrics.uptime_secs(),
        "indexer": status,
        "store": {
            "nodes": node_count,
            "snapshots": snapshot_count,
        }
    }))
}

/// GET /nodes - Stored node rows (limited)
async fn get_nodes(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match state.store.list_nodes().await {
        Ok(mut nodes) => {
            nodes.truncate(MAX_NODES_IN_RESPONSE);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "count": nodes.len(),
                    "nodes": nodes,
                })),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

/// GET /metrics - Prometheus format metrics
async fn get_metrics_prometheus(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.to_prometheus(),
    )
}

/// GET /metrics/json - JSON format metrics
async fn get_metrics_json(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.metrics.to_json())
}

/// POST /runs/:network - Trigger an indexing run.
///
/// When `api_token` is configured the caller must present it as a bearer
/// token. The run executes inline; the response carries the full report.
async fn trigger_run(
    State(state): State<Arc<ApiState>>,
    Path(network): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(expected) = &state.config.api_token {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value == format!("Bearer {}", expected))
            .unwrap_or(false);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "unauthorized" })),
            );
        }
    }

    let network = match network.parse::<Network>() {
        Ok(network) => network,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e })),
            );
        }
    };

    let report = state.indexer.run(network).await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        Json(serde_json::to_value(&report).unwrap_or_default()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkProfile;
    use crate::store::MemoryStore;

    /// API wired to an in-memory store and an indexer whose bootstrap
    /// points at a closed port; returns the base URL.
    async fn serve_api(api_token: Option<&str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Arc::new(IndexerConfig {
            api_token: api_token.map(|t| t.to_string()),
            credit_feeds: vec![],
            devnet: NetworkProfile {
                bootstrap: vec![format!("127.0.0.1:{}", dead)],
            },
            mainnet: NetworkProfile {
                bootstrap: vec![format!("127.0.0.1:{}", dead)],
            },
            ..IndexerConfig::default()
        });

        let store: Arc<dyn NodeStore> = Arc::new(MemoryStore::new());
        let metrics = Arc::new(IndexerMetrics::new());
        let indexer =
            Arc::new(Indexer::new(config.clone(), store.clone(), metrics.clone()).unwrap());

        let state = Arc::new(ApiState {
            config,
            store,
            indexer,
            metrics,
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://127.0.0.1:{}", port)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let base = serve_api(None).await;
        let body = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_status_reports_idle_phase() {
        let base = serve_api(None).await;
        let json: serde_json::Value = reqwest::get(format!("{}/status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(json["status"], "healthy");
        assert_eq!(json["indexer"]["phase"], "idle");
        assert_eq!(json["store"]["nodes"], 0);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_is_prometheus_text() {
        let base = serve_api(None).await;
        let body = reqwest::get(format!("{}/metrics", base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("pod_indexer_uptime_seconds"));
    }

    #[tokio::test]
    async fn test_trigger_requires_token_when_configured() {
        let base = serve_api(Some("secret")).await;
        let client = reqwest::Client::new();

        let status = client
            .post(format!("{}/runs/devnet", base))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status.as_u16(), 401);

        let status = client
            .post(format!("{}/runs/devnet", base))
            .header("authorization", "Bearer wrong")
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status.as_u16(), 401);
    }

    #[tokio::test]
    async fn test_trigger_rejects_unknown_network() {
        let base = serve_api(None).await;
        let status = reqwest::Client::new()
            .post(format!("{}/runs/testnet", base))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status.as_u16(), 400);
    }

    #[tokio::test]
    async fn test_trigger_surfaces_failed_run_as_500() {
        let base = serve_api(Some("secret")).await;
        let response = reqwest::Client::new()
            .post(format!("{}/runs/devnet", base))
            .header("authorization", "Bearer secret")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 500);
        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["processed"], 0);
    }
}
