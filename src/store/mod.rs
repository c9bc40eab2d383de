//! Persistence Adapter
//!
//! The indexer talks to its store through the [`NodeStore`] trait: upsert
//! by identity for node metadata, append-only insert for scored
//! snapshots. [`RocksStore`] is the production backend; [`MemoryStore`]
//! backs tests and dry runs.

mod memory;
mod rocks;

pub use memory::MemoryStore;
pub use rocks::RocksStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::{NodeRecord, NodeUpdate, SnapshotRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("codec error: {0}")]
    Codec(String),
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Codec(e.to_string())
    }
}

/// Row operations the indexer needs from its store.
///
/// Implementations must be safe to call from concurrent per-pod
/// pipelines; each pipeline only ever touches its own identity, and
/// snapshots are append-only, so no cross-pipeline coordination beyond
/// the snapshot sequence counter is required.
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn get_node(&self, pubkey: &str) -> Result<Option<NodeRecord>, StoreError>;

    /// Create or merge a node row by identity (see [`merge_node`])
    async fn upsert_node(&self, update: NodeUpdate) -> Result<(), StoreError>;

    /// Append one snapshot row. The store assigns `seq` (strictly
    /// increasing, surviving restarts) and `created_at`, and returns the
    /// assigned `seq`.
    async fn insert_snapshot(&self, snapshot: SnapshotRecord) -> Result<u64, StoreError>;

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, StoreError>;

    /// Known-country histogram over stored nodes, for scoring context
    async fn country_counts(&self) -> Result<HashMap<String, u64>, StoreError>;

    /// Total snapshots ever inserted
    async fn snapshot_count(&self) -> Result<u64, StoreError>;

    /// Flush any buffered writes (no-op for in-memory backends)
    async fn flush(&self) -> Result<(), StoreError>;
}

/// Merge an update into an existing node row.
///
/// Identity and `first_seen_at` are immutable; geolocation fields are
/// write-once (a `None` in the update never clears a resolved value);
/// address, liveness and `last_seen_at` always take the new value.
pub(crate) fn merge_node(
    existing: Option<NodeRecord>,
    update: &NodeUpdate,
    now: DateTime<Utc>,
) -> NodeRecord {
    match existing {
        Some(existing) => NodeRecord {
            pubkey: existing.pubkey,
            ip_address: update.ip_address.clone(),
            country: existing.country.or_else(|| update.country.clone()),
            city: existing.city.or_else(|| update.city.clone()),
            latitude: existing.latitude.or(update.latitude),
            longitude: existing.longitude.or(update.longitude),
            isp: existing.isp.or_else(|| update.isp.clone()),
            first_seen_at: existing.first_seen_at,
            last_seen_at: now,
            is_active: update.is_active,
        },
        None => NodeRecord {
            pubkey: update.pubkey.clone(),
            ip_address: update.ip_address.clone(),
            country: update.country.clone(),
            city: update.city.clone(),
            latitude: update.latitude,
            longitude: update.longitude,
            isp: update.isp.clone(),
            first_seen_at: now,
            last_seen_at: now,
            is_active: update.is_active,
        },
    }
}

/// Countries that count towards the known-country histogram
pub(crate) fn known_country(country: &Option<String>) -> Option<&str> {
    country
        .as_deref()
        .filter(|c| !c.is_empty() && *c != "Unknown")
}
