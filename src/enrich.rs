//! Per-Node Enricher
//!
//! Takes one normalized pod record and resolves everything scoring and
//! persistence need: fresher live telemetry straight from the pod (the
//! gossip-relayed bulk values are the fallback), a liveness flag, a
//! geolocation (resolved at most once per identity, ever), and the pod's
//! accrued credits.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::credits::CreditsTable;
use crate::geo::GeoClient;
use crate::rpc::RpcClient;
use crate::scoring::ScoreInput;
use crate::store::{NodeStore, StoreError};
use crate::types::{NodeUpdate, PodStats, SnapshotRecord};

#[derive(Debug, Error)]
pub enum EnrichError {
    /// No identity or no usable address: nothing to key a write on,
    /// so the pod is dropped without any partial write
    #[error("pod record has no identity or address")]
    Skipped,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fully resolved pod, ready for scoring and persistence
#[derive(Debug, Clone)]
pub struct EnrichedPod {
    pub pubkey: String,
    pub ip: String,
    pub cpu_percent: f64,
    pub ram_used: f64,
    pub ram_total: f64,
    pub uptime_seconds: f64,
    pub storage_used: f64,
    pub version: String,
    pub rpc_active: bool,
    pub credits: f64,
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub isp: Option<String>,

    /// Whether this enrichment spent an external geo lookup
    pub geo_looked_up: bool,
}

impl EnrichedPod {
    pub fn score_input(&self) -> ScoreInput<'_> {
        ScoreInput {
            uptime_seconds: self.uptime_seconds,
            ram_total: self.ram_total,
            storage_used: self.storage_used,
            version: &self.version,
            country: self.country.as_deref(),
        }
    }

    pub fn node_update(&self) -> NodeUpdate {
        NodeUpdate {
            pubkey: self.pubkey.clone(),
            ip_address: self.ip.clone(),
            country: self.country.clone(),
            city: self.city.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            isp: self.isp.clone(),
            // Present in gossip means active in the network sense, even
            // when the pod's own RPC is unreachable
            is_active: true,
        }
    }

    pub fn snapshot(&self, total_score: f64) -> SnapshotRecord {
        SnapshotRecord {
            seq: 0,
            node_pubkey: self.pubkey.clone(),
            created_at: chrono::Utc::now(),
            version: self.version.clone(),
            credits: self.credits,
            rpc_active: self.rpc_active,
            cpu_percent: self.cpu_percent,
            ram_used: self.ram_used,
            ram_total: self.ram_total,
            uptime_seconds: self.uptime_seconds,
            storage_used: self.storage_used,
            total_score,
        }
    }
}

pub struct Enricher {
    rpc: Arc<RpcClient>,
    geo: Arc<GeoClient>,
    store: Arc<dyn NodeStore>,
}

impl Enricher {
    pub fn new(rpc: Arc<RpcClient>, geo: Arc<GeoClient>, store: Arc<dyn NodeStore>) -> Self {
        Self { rpc, geo, store }
    }

    /// Run the enrichment chain for one pod.
    pub async fn enrich(
        &self,
        stats: &PodStats,
        credits: &CreditsTable,
    ) -> Result<EnrichedPod, EnrichError> {
        let ip = stats
            .address
            .split(':')
            .next()
            .unwrap_or_default()
            .to_string();

        if stats.pubkey.is_empty() || ip.is_empty() {
            return Err(EnrichError::Skipped);
        }

        // Direct query beats gossip-relayed values when the pod answers
        let (mut cpu_percent, mut ram_used, mut ram_total, mut uptime_seconds) = (
            stats.cpu_percent,
            stats.ram_used,
            stats.ram_total,
            stats.uptime_seconds,
        );

        match self.rpc.get_stats(&ip).await {
            Ok(live) => {
                cpu_percent = live.cpu_percent;
                ram_used = live.ram_used;
                ram_total = live.ram_total;
                uptime_seconds = live.uptime.unwrap_or(0.0);
            }
            Err(e) => {
                debug!(pod = %stats.pubkey, error = %e, "live stats unavailable, keeping bulk values");
            }
        }

        // All-zero telemetry with no uptime means the pod is visible in
        // gossip but not truly RPC-responsive
        let rpc_active = uptime_seconds > 0.0 || cpu_percent > 0.0;

        let existing = self.store.get_node(&stats.pubkey).await?;
        let (mut country, mut city, mut latitude, mut longitude, mut isp) = match &existing {
            Some(node) => (
                node.country.clone(),
                node.city.clone(),
                node.latitude,
                node.longitude,
                node.isp.clone(),
            ),
            None => (None, None, None, None, None),
        };

        // One external lookup per identity, ever, and only for live pods:
        // known coordinates are never overwritten and dead pods are not
        // worth the API quota
        let mut geo_looked_up = false;
        if latitude.is_none() && rpc_active {
            geo_looked_up = true;
            if let Some(info) = self.geo.lookup(&ip).await {
                country = info.country;
                city = info.city;
                latitude = info.lat;
                longitude = info.lon;
                isp = info.isp;
            }
        }

        Ok(EnrichedPod {
            pubkey: stats.pubkey.clone(),
            ip,
            cpu_percent,
            ram_used,
            ram_total,
            uptime_seconds,
            storage_used: stats.storage_used,
            version: stats.version.clone(),
            rpc_active,
            credits: credits.credits_for(&stats.pubkey),
            country,
            city,
            latitude,
            longitude,
            isp,
            geo_looked_up,
        })
    }
}
