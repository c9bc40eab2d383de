//! IP geolocation lookup
//!
//! Thin client over an ip-to-location HTTP service. Lookups are
//! best-effort: anything other than an explicit success reply is treated
//! as "location unknown" so a flaky geo provider never fails a pipeline.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::IndexerConfig;

/// Successful geolocation reply
#[derive(Debug, Clone, Deserialize)]
pub struct GeoInfo {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub country: Option<String>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub lat: Option<f64>,

    #[serde(default)]
    pub lon: Option<f64>,

    #[serde(default)]
    pub isp: Option<String>,
}

pub struct GeoClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GeoClient {
    pub fn new(client: Client, config: &IndexerConfig) -> Self {
        Self {
            client,
            base_url: config.geo_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.geo_timeout_secs),
        }
    }

    /// Resolve a bare IP to a location; `None` on any failure or on a
    /// reply whose status is not `"success"`.
    pub async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        let url = format!("{}/{}", self.base_url, ip);

        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(ip = %ip, error = %e, "geo lookup failed");
                return None;
            }
        };

        let info: GeoInfo = match response.json().await {
            Ok(i) => i,
            Err(e) => {
                debug!(ip = %ip, error = %e, "geo reply unparsable");
                return None;
            }
        };

        if info.status == "success" {
            Some(info)
        } else {
            debug!(ip = %ip, status = %info.status, "geo service declined lookup");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, routing::get, Json, Router};

    async fn serve_geo(reply: serde_json::Value) -> GeoClient {
        let app = Router::new().route(
            "/:ip",
            get(move |Path(_ip): Path<String>| {
                let reply = reply.clone();
                async move { Json(reply) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = IndexerConfig {
            geo_url: format!("http://127.0.0.1:{}", port),
            ..IndexerConfig::default()
        };
        GeoClient::new(Client::new(), &config)
    }

    #[tokio::test]
    async fn test_successful_lookup() {
        let client = serve_geo(serde_json::json!({
            "status": "success",
            "country": "Germany",
            "city": "Nuremberg",
            "lat": 49.45,
            "lon": 11.07,
            "isp": "Contabo GmbH"
        }))
        .await;

        let info = client.lookup("1.2.3.4").await.unwrap();
        assert_eq!(info.country.as_deref(), Some("Germany"));
        assert_eq!(info.lat, Some(49.45));
    }

    #[tokio::test]
    async fn test_failed_status_is_none() {
        let client = serve_geo(serde_json::json!({
            "status": "fail",
            "message": "private range"
        }))
        .await;

        assert!(client.lookup("10.0.0.1").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_none() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = IndexerConfig {
            geo_url: format!("http://127.0.0.1:{}", port),
            ..IndexerConfig::default()
        };
        let client = GeoClient::new(Client::new(), &config);
        assert!(client.lookup("1.2.3.4").await.is_none());
    }
}
