//! Credits ledger feeds
//!
//! Accrued credit totals live in external per-network ledger feeds that
//! are fetched once before the per-pod fan-out. The same identity can
//! show up in more than one feed; duplicates are merged by the configured
//! policy. A feed that fails to answer degrades to whatever the others
//! returned — worst case every pod defaults to zero credits.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::{IndexerConfig, MergePolicy};

/// One ledger entry
#[derive(Debug, Deserialize)]
struct PodCredit {
    pod_id: String,

    #[serde(default)]
    credits: f64,
}

/// Ledger feed envelope
#[derive(Debug, Deserialize)]
struct CreditsFeed {
    #[serde(default)]
    pods_credits: Vec<PodCredit>,
}

/// Merged credits by identity, plus feed health for the run report
#[derive(Debug, Default)]
pub struct CreditsTable {
    pub by_identity: HashMap<String, f64>,
    pub feeds_ok: usize,
    pub feeds_failed: usize,
}

impl CreditsTable {
    pub fn credits_for(&self, pubkey: &str) -> f64 {
        self.by_identity.get(pubkey).copied().unwrap_or(0.0)
    }
}

pub struct CreditsClient {
    client: Client,
    feeds: Vec<String>,
    timeout: Duration,
    policy: MergePolicy,
}

impl CreditsClient {
    pub fn new(client: Client, config: &IndexerConfig) -> Self {
        Self {
            client,
            feeds: config.credit_feeds.clone(),
            timeout: Duration::from_secs(config.feed_timeout_secs),
            policy: config.credits_merge,
        }
    }

    /// Fetch every configured feed concurrently and merge the results.
    /// Never fails; missing feeds just mean fewer (or zero) credits.
    pub async fn fetch(&self) -> CreditsTable {
        let mut table = CreditsTable::default();

        let mut set = JoinSet::new();
        for url in self.feeds.clone() {
            let client = self.client.clone();
            let timeout = self.timeout;
            set.spawn(async move {
                let result = fetch_feed(&client, &url, timeout).await;
                (url, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let Ok((url, result)) = joined else {
                table.feeds_failed += 1;
                continue;
            };

            match result {
                Ok(entries) => {
                    info!(feed = %url, entries = entries.len(), "credits feed loaded");
                    table.feeds_ok += 1;
                    for entry in entries {
                        merge_entry(&mut table.by_identity, self.policy, entry);
                    }
                }
                Err(e) => {
                    warn!(feed = %url, error = %e, "credits feed failed, defaulting to zero");
                    table.feeds_failed += 1;
                }
            }
        }

        table
    }
}

async fn fetch_feed(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<PodCredit>, reqwest::Error> {
    let feed: CreditsFeed = client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(feed.pods_credits)
}

fn merge_entry(table: &mut HashMap<String, f64>, policy: MergePolicy, entry: PodCredit) {
    let slot = table.entry(entry.pod_id).or_insert(0.0);
    *slot = match policy {
        MergePolicy::Max => slot.max(entry.credits),
        MergePolicy::Sum => *slot + entry.credits,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};

    async fn serve_feed(reply: serde_json::Value) -> String {
        let app = Router::new().route(
            "/credits",
            get(move || {
                let reply = reply.clone();
                async move { Json(reply) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{}/credits", port)
    }

    async fn serve_broken_feed() -> String {
        let app = Router::new().route(
            "/credits",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "nope") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{}/credits", port)
    }

    fn client_for(feeds: Vec<String>, policy: MergePolicy) -> CreditsClient {
        let config = IndexerConfig {
            credit_feeds: feeds,
            credits_merge: policy,
            ..IndexerConfig::default()
        };
        CreditsClient::new(Client::new(), &config)
    }

    #[tokio::test]
    async fn test_duplicate_identity_takes_max() {
        let feed_a = serve_feed(serde_json::json!({
            "pods_credits": [
                { "pod_id": "pod1", "credits": 100.0 },
                { "pod_id": "pod2", "credits": 7.0 }
            ]
        }))
        .await;
        let feed_b = serve_feed(serde_json::json!({
            "pods_credits": [ { "pod_id": "pod1", "credits": 250.0 } ]
        }))
        .await;

        let table = client_for(vec![feed_a, feed_b], MergePolicy::Max)
            .fetch()
            .await;

        assert_eq!(table.feeds_ok, 2);
        assert_eq!(table.credits_for("pod1"), 250.0);
        assert_eq!(table.credits_for("pod2"), 7.0);
    }

    #[tokio::test]
    async fn test_duplicate_identity_sums_when_configured() {
        let feed_a = serve_feed(serde_json::json!({
            "pods_credits": [ { "pod_id": "pod1", "credits": 100.0 } ]
        }))
        .await;
        let feed_b = serve_feed(serde_json::json!({
            "pods_credits": [ { "pod_id": "pod1", "credits": 250.0 } ]
        }))
        .await;

        let table = client_for(vec![feed_a, feed_b], MergePolicy::Sum)
            .fetch()
            .await;

        assert_eq!(table.credits_for("pod1"), 350.0);
    }

    #[tokio::test]
    async fn test_failed_feed_degrades_gracefully() {
        let good = serve_feed(serde_json::json!({
            "pods_credits": [ { "pod_id": "pod1", "credits": 42.0 } ]
        }))
        .await;
        let bad = serve_broken_feed().await;

        let table = client_for(vec![good, bad], MergePolicy::Max).fetch().await;

        assert_eq!(table.feeds_ok, 1);
        assert_eq!(table.feeds_failed, 1);
        assert_eq!(table.credits_for("pod1"), 42.0);
    }

    #[tokio::test]
    async fn test_unknown_identity_defaults_to_zero() {
        let table = CreditsTable::default();
        assert_eq!(table.credits_for("missing"), 0.0);
    }
}
