//! In-memory node store
//!
//! Backs tests and `--dry-run` passes where indexing results should not
//! outlive the process.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::{known_country, merge_node, NodeStore, StoreError};
use crate::types::{NodeRecord, NodeUpdate, SnapshotRecord};

#[derive(Default)]
pub struct MemoryStore {
    nodes: Mutex<HashMap<String, NodeRecord>>,
    snapshots: Mutex<Vec<SnapshotRecord>>,
    snapshot_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All inserted snapshots, in insert order (test inspection)
    pub fn snapshots(&self) -> Vec<SnapshotRecord> {
        self.snapshots
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn get_node(&self, pubkey: &str) -> Result<Option<NodeRecord>, StoreError> {
        let nodes = self
            .nodes
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(nodes.get(pubkey).cloned())
    }

    async fn upsert_node(&self, update: NodeUpdate) -> Result<(), StoreError> {
        let mut nodes = self
            .nodes
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let existing = nodes.get(&update.pubkey).cloned();
        let merged = merge_node(existing, &update, Utc::now());
        nodes.insert(merged.pubkey.clone(), merged);
        Ok(())
    }

    async fn insert_snapshot(&self, mut snapshot: SnapshotRecord) -> Result<u64, StoreError> {
        let seq = self.snapshot_seq.fetch_add(1, Ordering::SeqCst) + 1;
        snapshot.seq = seq;
        snapshot.created_at = Utc::now();

        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        snapshots.push(snapshot);
        Ok(seq)
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        let nodes = self
            .nodes
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(nodes.values().cloned().collect())
    }

    async fn country_counts(&self) -> Result<HashMap<String, u64>, StoreError> {
        let mut counts = HashMap::new();
        for node in self.list_nodes().await? {
            if let Some(country) = known_country(&node.country) {
                *counts.entry(country.to_string()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn snapshot_count(&self) -> Result<u64, StoreError> {
        Ok(self.snapshot_seq.load(Ordering::SeqCst))
    }

    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(pubkey: &str) -> NodeUpdate {
        NodeUpdate {
            pubkey: pubkey.to_string(),
            ip_address: "10.0.0.1".to_string(),
            country: Some("Germany".to_string()),
            city: None,
            latitude: Some(49.45),
            longitude: Some(11.07),
            isp: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_keyed_by_identity() {
        let store = MemoryStore::new();

        store.upsert_node(update("pod1")).await.unwrap();
        store.upsert_node(update("pod1")).await.unwrap();
        store.upsert_node(update("pod2")).await.unwrap();

        assert_eq!(store.list_nodes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshots_append_only() {
        let store = MemoryStore::new();

        let snap = SnapshotRecord {
            seq: 0,
            node_pubkey: "pod1".to_string(),
            created_at: Utc::now(),
            version: "0.7.0".to_string(),
            credits: 0.0,
            rpc_active: true,
            cpu_percent: 0.0,
            ram_used: 0.0,
            ram_total: 0.0,
            uptime_seconds: 0.0,
            storage_used: 0.0,
            total_score: 50.0,
        };

        let s1 = store.insert_snapshot(snap.clone()).await.unwrap();
        let s2 = store.insert_snapshot(snap).await.unwrap();

        assert_eq!((s1, s2), (1, 2));
        assert_eq!(store.snapshots().len(), 2);
        assert_eq!(store.snapshot_count().await.unwrap(), 2);
    }
}
