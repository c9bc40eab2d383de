//! Core types for the pod network indexer
//!
//! These types cover the three stages a pod record moves through:
//! the raw heterogeneous shape reported by entry nodes, the canonical
//! normalized telemetry record, and the persisted node/snapshot rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Helper for fields that RPC servers report either as a number or as a
/// string-encoded number (uptime is the known offender across versions).
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    let value: Option<Raw> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Str(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    })
}

// =============================================================================
// LOGICAL NETWORKS
// =============================================================================

/// Logical network a run indexes against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Devnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Devnet => "devnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "devnet" => Ok(Network::Devnet),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

// =============================================================================
// RAW DISCOVERY RECORDS
// =============================================================================

/// One pod record as returned by an entry node's discovery method.
///
/// Field names and units vary between RPC server versions (`cpu` vs
/// `cpu_percent`, `memory` vs `memory_used`, string vs numeric uptime),
/// so everything is optional here. [`crate::normalize::normalize`] is the
/// single place this drift is absorbed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPod {
    #[serde(default)]
    pub pubkey: Option<String>,

    /// Some server versions return the pubkey as `id`
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub ip: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    /// Number or string-encoded seconds depending on the server version
    #[serde(default, deserialize_with = "number_or_string")]
    pub uptime: Option<f64>,

    #[serde(default)]
    pub cpu: Option<f64>,

    #[serde(default)]
    pub cpu_percent: Option<f64>,

    #[serde(default)]
    pub memory: Option<f64>,

    #[serde(default)]
    pub memory_used: Option<f64>,

    #[serde(default)]
    pub memory_total: Option<f64>,

    #[serde(default)]
    pub storage_committed: Option<f64>,

    #[serde(default)]
    pub storage_used: Option<f64>,

    #[serde(default)]
    pub is_public: Option<bool>,

    #[serde(default)]
    pub last_seen_timestamp: Option<i64>,
}

/// Result payload of a pod's own `get-stats` method.
///
/// Considered more authoritative than gossip-relayed bulk values because
/// it is read directly from the pod.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveStats {
    #[serde(default)]
    pub cpu_percent: f64,

    #[serde(default)]
    pub ram_used: f64,

    #[serde(default)]
    pub ram_total: f64,

    #[serde(default, deserialize_with = "number_or_string")]
    pub uptime: Option<f64>,

    #[serde(default)]
    pub active_streams: u64,

    #[serde(default)]
    pub packets_received: u64,

    #[serde(default)]
    pub packets_sent: u64,
}

// =============================================================================
// CANONICAL TELEMETRY
// =============================================================================

/// Canonical per-pod telemetry after normalization.
///
/// Every numeric field is concrete (missing inputs default to zero) so
/// downstream arithmetic never deals with nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodStats {
    /// Identity key (public key string); empty when the record carried none
    pub pubkey: String,

    /// `ip:port` network address; empty when the record carried none
    pub address: String,

    pub cpu_percent: f64,

    pub ram_used: f64,

    pub ram_total: f64,

    pub uptime_seconds: f64,

    pub storage_used: f64,

    /// Software version, `"unknown"` sentinel when unreported
    pub version: String,

    /// Peer-reported liveness status string
    pub status: String,
}

// =============================================================================
// PERSISTED ROWS
// =============================================================================

/// Slowly-changing node metadata, upserted by identity, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Immutable identity key
    pub pubkey: String,

    pub ip_address: String,

    pub country: Option<String>,

    pub city: Option<String>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    pub isp: Option<String>,

    pub first_seen_at: DateTime<Utc>,

    pub last_seen_at: DateTime<Utc>,

    pub is_active: bool,
}

/// Per-run update applied to a [`NodeRecord`] via upsert.
///
/// Geolocation fields are write-once: an update carrying `None` never
/// clears a previously resolved location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    pub pubkey: String,
    pub ip_address: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub isp: Option<String>,
    pub is_active: bool,
}

/// One append-only telemetry + score row per responsive pod per run.
///
/// `seq` and `created_at` are assigned by the store on insert; `seq` is
/// strictly increasing across inserts (and across restarts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub seq: u64,

    pub node_pubkey: String,

    pub created_at: DateTime<Utc>,

    pub version: String,

    pub credits: f64,

    /// Whether the pod answered (or reported) live telemetry this run
    pub rpc_active: bool,

    pub cpu_percent: f64,

    pub ram_used: f64,

    pub ram_total: f64,

    pub uptime_seconds: f64,

    pub storage_used: f64,

    pub total_score: f64,
}

// =============================================================================
// RUN REPORTING
// =============================================================================

/// State machine of one indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    Discovering,
    Enriching,
    Completed,
    Failed,
}

/// Structured result returned to the caller of an indexing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub network: Network,

    pub success: bool,

    /// Pods returned by discovery
    pub discovered: usize,

    /// Pods that made it through enrichment, scoring and persistence
    pub processed: usize,

    /// Pods attempted but skipped or failed
    pub failed: usize,

    /// Entry address that served the peer list (diagnostics only)
    pub entry: Option<String>,

    pub message: Option<String>,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Report for a run that never got past discovery
    pub fn failed(network: Network, started_at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            network,
            success: false,
            discovered: 0,
            processed: 0,
            failed: 0,
            entry: None,
            message: Some(message.into()),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Current indexer state as exposed by the API status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub phase: RunPhase,
    pub last_report: Option<RunReport>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            phase: RunPhase::Idle,
            last_report: None,
        }
    }
}
