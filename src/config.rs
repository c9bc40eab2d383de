//! Indexer Configuration
//!
//! Configurable parameters for the pod network indexer.
//! Default values match the production networks this service ships for.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::Network;

/// Bootstrap profile for one logical network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// Ordered entry-node addresses (`ip` or `ip:port`) tried during
    /// discovery; the first one that yields a non-empty pod list wins
    pub bootstrap: Vec<String>,
}

/// Duplicate-identity merge policy for credits feeds.
///
/// The same identity can appear in more than one ledger feed; `max`
/// defends against double reporting, `sum` treats feeds as disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    Max,
    Sum,
}

/// Main configuration for the indexer service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    // === Networks ===

    /// RPC control port used when a bootstrap entry or pod address
    /// carries no explicit port
    pub rpc_port: u16,

    // === Timeouts (per call, seconds) ===

    /// Entry-node `get-pods-with-stats` call
    pub discovery_timeout_secs: u64,

    /// Entry-node plain `get-pods` fallback call
    pub pods_timeout_secs: u64,

    /// Per-pod `get-stats` call
    pub stats_timeout_secs: u64,

    /// Geolocation lookup
    pub geo_timeout_secs: u64,

    /// Credits ledger feed fetch
    pub feed_timeout_secs: u64,

    // === Concurrency ===

    /// Maximum simultaneously in-flight per-pod pipelines
    pub concurrency: usize,

    // === External services ===

    /// IP geolocation service base URL; the pod's bare IP is appended
    pub geo_url: String,

    /// Credits ledger feed URLs, all fetched before each run
    pub credit_feeds: Vec<String>,

    /// How duplicate identities across feeds are merged
    pub credits_merge: MergePolicy,

    // === Service ===

    /// HTTP API port
    pub api_port: u16,

    /// Optional bearer token required by the manual run trigger
    pub api_token: Option<String>,

    /// Interval between scheduled runs in `serve` mode (seconds)
    pub run_interval_secs: u64,

    /// Networks indexed on each scheduled tick
    pub serve_networks: Vec<Network>,

    // === Bootstrap profiles (tables last so the TOML renders cleanly) ===

    /// Mainnet bootstrap profile
    pub mainnet: NetworkProfile,

    /// Devnet bootstrap profile
    pub devnet: NetworkProfile,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            rpc_port: 6000,

            // Timeouts - discovery is allowed the longest call since the
            // bulk stats payload is the heaviest
            discovery_timeout_secs: 8,
            pods_timeout_secs: 5,
            stats_timeout_secs: 3,
            geo_timeout_secs: 3,
            feed_timeout_secs: 10,

            concurrency: 50,

            geo_url: "http://ip-api.com/json".to_string(),
            credit_feeds: vec![
                "https://podcredits.xandeum.network/api/pods-credits".to_string(),
                "https://podcredits.xandeum.network/api/mainnet-pod-credits".to_string(),
            ],
            credits_merge: MergePolicy::Max,

            api_port: 8080,
            api_token: None,
            run_interval_secs: 300,
            serve_networks: vec![Network::Mainnet, Network::Devnet],

            mainnet: NetworkProfile {
                bootstrap: vec![
                    "161.97.97.41".to_string(),
                    "173.212.203.145".to_string(),
                    "173.212.220.65".to_string(),
                    "62.171.138.27".to_string(),
                    "173.212.207.32".to_string(),
                    "62.171.135.107".to_string(),
                    "173.249.3.118".to_string(),
                ],
            },
            devnet: NetworkProfile {
                bootstrap: vec!["89.123.115.81".to_string()],
            },
        }
    }
}

impl IndexerConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Bootstrap list for a logical network
    pub fn bootstrap_for(&self, network: Network) -> &[String] {
        match network {
            Network::Mainnet => &self.mainnet.bootstrap,
            Network::Devnet => &self.devnet.bootstrap,
        }
    }

    // Builder-style methods for CLI overrides

    pub fn with_api_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.api_port = port;
        }
        self
    }

    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        if let Some(concurrency) = concurrency {
            self.concurrency = concurrency;
        }
        self
    }

    pub fn with_run_interval(mut self, interval_secs: Option<u64>) -> Self {
        if let Some(interval_secs) = interval_secs {
            self.run_interval_secs = interval_secs;
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }

        if self.mainnet.bootstrap.is_empty() && self.devnet.bootstrap.is_empty() {
            anyhow::bail!("at least one network needs a non-empty bootstrap list");
        }

        if self.discovery_timeout_secs == 0
            || self.pods_timeout_secs == 0
            || self.stats_timeout_secs == 0
            || self.geo_timeout_secs == 0
            || self.feed_timeout_secs == 0
        {
            anyhow::bail!("all per-call timeouts must be non-zero");
        }

        if self.run_interval_secs < 30 {
            anyhow::bail!(
                "run_interval_secs ({}) is below the 30s minimum",
                self.run_interval_secs
            );
        }

        Ok(())
    }
}
