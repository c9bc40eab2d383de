//! JSON-RPC client for pod control endpoints
//!
//! Single request-response calls against `http://<ip>:<port>/rpc` with a
//! per-call deadline. There are no retries here; callers drive fallback
//! (rich method -> plain method, live stats -> bulk stats).

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::config::IndexerConfig;
use crate::types::{LiveStats, RawPod};

/// JSON-RPC request envelope
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: serde_json::Value,
    id: u64,
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[serde(default)]
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[serde(default)]
    #[allow(dead_code)]
    id: serde_json::Value,
}

/// JSON-RPC error object
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[allow(dead_code)]
    code: i64,
    message: String,
}

/// Pod list payload shared by the two discovery methods
#[derive(Debug, Deserialize)]
struct PodsResult {
    #[serde(default)]
    pods: Vec<RawPod>,
}

/// Uniform "unsuccessful call" result.
///
/// Network-level failures (timeout, refused, reset) and application-level
/// failures (explicit error object in the envelope) both land here;
/// callers decide fallback policy, not this client.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("peer returned error: {0}")]
    Peer(String),

    #[error("peer response carried no result")]
    MissingResult,
}

/// JSON-RPC client with per-method deadlines.
///
/// Owns one connection-pooling HTTP client; constructed once per process
/// and passed into the pipeline rather than living in a global.
pub struct RpcClient {
    client: Client,
    default_port: u16,
    discovery_timeout: Duration,
    pods_timeout: Duration,
    stats_timeout: Duration,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn new(client: Client, config: &IndexerConfig) -> Self {
        Self {
            client,
            default_port: config.rpc_port,
            discovery_timeout: Duration::from_secs(config.discovery_timeout_secs),
            pods_timeout: Duration::from_secs(config.pods_timeout_secs),
            stats_timeout: Duration::from_secs(config.stats_timeout_secs),
            request_id: AtomicU64::new(1),
        }
    }

    /// Bulk discovery with telemetry, the richer of the two peer-list methods
    pub async fn get_pods_with_stats(&self, target: &str) -> Result<Vec<RawPod>, RpcError> {
        let result: PodsResult = self
            .call(target, "get-pods-with-stats", self.discovery_timeout)
            .await?;
        Ok(result.pods)
    }

    /// Plain peer list, the fallback when the rich method is unavailable
    pub async fn get_pods(&self, target: &str) -> Result<Vec<RawPod>, RpcError> {
        let result: PodsResult = self.call(target, "get-pods", self.pods_timeout).await?;
        Ok(result.pods)
    }

    /// Live resource stats straight from one pod
    pub async fn get_stats(&self, target: &str) -> Result<LiveStats, RpcError> {
        self.call(target, "get-stats", self.stats_timeout).await
    }

    /// RPC endpoint for a target given as `ip` or `ip:port`
    fn rpc_url(&self, target: &str) -> String {
        if target.contains(':') {
            format!("http://{}/rpc", target)
        } else {
            format!("http://{}:{}/rpc", target, self.default_port)
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// One JSON-RPC call with its own deadline
    async fn call<T: DeserializeOwned>(
        &self,
        target: &str,
        method: &str,
        timeout: Duration,
    ) -> Result<T, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: method.to_string(),
            params: serde_json::json!([]),
            id: self.next_id(),
        };

        let response = self
            .client
            .post(self.rpc_url(target))
            .timeout(timeout)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let envelope: JsonRpcResponse<T> = response.json().await?;

        if let Some(error) = envelope.error {
            return Err(RpcError::Peer(error.message));
        }

        envelope.result.ok_or(RpcError::MissingResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    fn test_client(port: u16) -> RpcClient {
        let config = IndexerConfig {
            rpc_port: port,
            ..IndexerConfig::default()
        };
        RpcClient::new(Client::new(), &config)
    }

    /// Serve a canned JSON-RPC reply on an ephemeral port
    async fn serve_rpc(reply: serde_json::Value) -> u16 {
        let app = Router::new().route(
            "/rpc",
            post(move |Json(_req): Json<serde_json::Value>| {
                let reply = reply.clone();
                async move { Json(reply) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }

    #[test]
    fn test_rpc_url_port_handling() {
        let client = test_client(6000);
        assert_eq!(client.rpc_url("1.2.3.4"), "http://1.2.3.4:6000/rpc");
        assert_eq!(client.rpc_url("1.2.3.4:7000"), "http://1.2.3.4:7000/rpc");
    }

    #[tokio::test]
    async fn test_get_pods_with_stats_parses_payload() {
        let port = serve_rpc(serde_json::json!({
            "jsonrpc": "2.0",
            "result": { "pods": [ { "pubkey": "p1", "cpu": 5.0 }, { "id": "p2" } ] },
            "id": 1
        }))
        .await;

        let client = test_client(port);
        let pods = client.get_pods_with_stats("127.0.0.1").await.unwrap();
        assert_eq!(pods.len(), 2);
        assert_eq!(pods[0].pubkey.as_deref(), Some("p1"));
        assert_eq!(pods[1].id.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn test_peer_error_surfaces_as_rpc_error() {
        let port = serve_rpc(serde_json::json!({
            "jsonrpc": "2.0",
            "error": { "code": -32601, "message": "method not found" },
            "id": 1
        }))
        .await;

        let client = test_client(port);
        let err = client.get_pods("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, RpcError::Peer(m) if m.contains("method not found")));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = test_client(port);
        let err = client.get_stats("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[tokio::test]
    async fn test_missing_result_is_an_error() {
        let port = serve_rpc(serde_json::json!({ "jsonrpc": "2.0", "id": 1 })).await;

        let client = test_client(port);
        let err = client.get_stats("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, RpcError::MissingResult));
    }
}
