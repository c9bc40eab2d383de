//! RocksDB-backed node store
//!
//! Key layout:
//! - `node:<pubkey>` -> bincode [`NodeRecord`]
//! - `snap:<seq, zero-padded>` -> bincode [`SnapshotRecord`]
//! - `meta:snapshot_seq` -> last assigned snapshot sequence (big-endian u64)
//!
//! The zero-padded snapshot key keeps rows iterable in insert order; the
//! persisted sequence counter keeps `seq` strictly increasing across
//! service restarts.

use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{Direction, IteratorMode, Options, DB};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::{known_country, merge_node, NodeStore, StoreError};
use crate::types::{NodeRecord, NodeUpdate, SnapshotRecord};

const PREFIX_NODE: &[u8] = b"node:";
const PREFIX_SNAP: &[u8] = b"snap:";
const META_SNAPSHOT_SEQ: &[u8] = b"meta:snapshot_seq";

pub struct RocksStore {
    db: DB,
    snapshot_seq: AtomicU64,
}

impl RocksStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_open_files(100);
        opts.set_keep_log_file_num(3);

        let db = DB::open(&opts, path)?;

        let snapshot_seq = match db.get(META_SNAPSHOT_SEQ)? {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                u64::from_be_bytes(buf)
            }
            _ => 0,
        };

        let node_count = db
            .iterator(IteratorMode::From(PREFIX_NODE, Direction::Forward))
            .take_while(|item| match item {
                Ok((key, _)) => key.starts_with(PREFIX_NODE),
                Err(_) => false,
            })
            .count();

        info!(
            nodes = node_count,
            snapshots = snapshot_seq,
            "node store opened"
        );

        Ok(Self {
            db,
            snapshot_seq: AtomicU64::new(snapshot_seq),
        })
    }

    fn node_key(pubkey: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(PREFIX_NODE.len() + pubkey.len());
        key.extend_from_slice(PREFIX_NODE);
        key.extend_from_slice(pubkey.as_bytes());
        key
    }

    fn snap_key(seq: u64) -> Vec<u8> {
        format!("snap:{:020}", seq).into_bytes()
    }
}

#[async_trait]
impl NodeStore for RocksStore {
    async fn get_node(&self, pubkey: &str) -> Result<Option<NodeRecord>, StoreError> {
        match self.db.get(Self::node_key(pubkey))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn upsert_node(&self, update: NodeUpdate) -> Result<(), StoreError> {
        let existing = self.get_node(&update.pubkey).await?;
        let merged = merge_node(existing, &update, Utc::now());

        let value = bincode::serialize(&merged)?;
        self.db.put(Self::node_key(&merged.pubkey), value)?;
        Ok(())
    }

    async fn insert_snapshot(&self, mut snapshot: SnapshotRecord) -> Result<u64, StoreError> {
        let seq = self.snapshot_seq.fetch_add(1, Ordering::SeqCst) + 1;
        snapshot.seq = seq;
        snapshot.created_at = Utc::now();

        let value = bincode::serialize(&snapshot)?;
        self.db.put(Self::snap_key(seq), value)?;
        self.db.put(META_SNAPSHOT_SEQ, seq.to_be_bytes())?;
        Ok(seq)
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        let mut nodes = Vec::new();

        let iter = self
            .db
            .iterator(IteratorMode::From(PREFIX_NODE, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(PREFIX_NODE) {
                break;
            }
            nodes.push(bincode::deserialize(&value)?);
        }

        Ok(nodes)
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
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn update(pubkey: &str, country: Option<&str>) -> NodeUpdate {
        NodeUpdate {
            pubkey: pubkey.to_string(),
            ip_address: "10.0.0.1".to_string(),
            country: country.map(|c| c.to_string()),
            city: None,
            latitude: country.map(|_| 49.45),
            longitude: country.map(|_| 11.07),
            isp: None,
            is_active: true,
        }
    }

    fn snapshot(pubkey: &str) -> SnapshotRecord {
        SnapshotRecord {
            seq: 0,
            node_pubkey: pubkey.to_string(),
            created_at: Utc::now(),
            version: "0.7.1".to_string(),
            credits: 10.0,
            rpc_active: true,
            cpu_percent: 12.0,
            ram_used: 1.0e9,
            ram_total: 16.0e9,
            uptime_seconds: 3600.0,
            storage_used: 5.0e9,
            total_score: 55.0,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        store.upsert_node(update("pod1", None)).await.unwrap();

        let node = store.get_node("pod1").await.unwrap().unwrap();
        assert_eq!(node.pubkey, "pod1");
        assert!(node.is_active);

        assert!(store.get_node("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_geo_survives_relocation_attempt() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        store
            .upsert_node(update("pod1", Some("Germany")))
            .await
            .unwrap();
        store.upsert_node(update("pod1", None)).await.unwrap();

        let node = store.get_node("pod1").await.unwrap().unwrap();
        assert_eq!(node.country.as_deref(), Some("Germany"));
        assert_eq!(node.latitude, Some(49.45));
    }

    #[tokio::test]
    async fn test_snapshot_seq_strictly_increases() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        let s1 = store.insert_snapshot(snapshot("pod1")).await.unwrap();
        let s2 = store.insert_snapshot(snapshot("pod1")).await.unwrap();
        let s3 = store.insert_snapshot(snapshot("pod2")).await.unwrap();

        assert!(s1 < s2 && s2 < s3);
        assert_eq!(store.snapshot_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_seq_survives_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = RocksStore::open(dir.path()).unwrap();
            store.insert_snapshot(snapshot("pod1")).await.unwrap();
            store.insert_snapshot(snapshot("pod1")).await.unwrap();
            store.flush().await.unwrap();
        }

        {
            let store = RocksStore::open(dir.path()).unwrap();
            let next = store.insert_snapshot(snapshot("pod1")).await.unwrap();
            assert_eq!(next, 3);
        }
    }

    #[tokio::test]
    async fn test_country_counts_skip_unknown() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        store
            .upsert_node(update("pod1", Some("Germany")))
            .await
            .unwrap();
        store
            .upsert_node(update("pod2", Some("Germany")))
            .await
            .unwrap();
        store
            .upsert_node(update("pod3", Some("France")))
            .await
            .unwrap();
        store.upsert_node(update("pod4", None)).await.unwrap();

        let counts = store.country_counts().await.unwrap();
        assert_eq!(counts.get("Germany"), Some(&2));
        assert_eq!(counts.get("France"), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[tokio::test]
    async fn test_list_nodes_round_trips_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = RocksStore::open(dir.path()).unwrap();
            store
                .upsert_node(update("pod1", Some("Germany")))
                .await
                .unwrap();
            store.upsert_node(update("pod2", None)).await.unwrap();
            store.flush().await.unwrap();
        }

        {
            let store = RocksStore::open(dir.path()).unwrap();
            let nodes = store.list_nodes().await.unwrap();
            assert_eq!(nodes.len(), 2);
        }
    }
}
