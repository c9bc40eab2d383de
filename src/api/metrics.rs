//! Metrics Collection
//!
//! Counters for monitoring indexer runs and the external calls they make.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics collector for the indexer service
#[derive(Default)]
pub struct IndexerMetrics {
    /// Start time for uptime calculation
    start_time: Option<Instant>,

    /// Runs started
    pub runs_started: AtomicU64,

    /// Runs that completed (with at least discovery succeeding)
    pub runs_completed: AtomicU64,

    /// Runs that failed outright (no pods discovered)
    pub runs_failed: AtomicU64,

    /// Pods returned by discovery, cumulative
    pub pods_discovered: AtomicU64,

    /// Pods fully processed (enriched, scored, persisted)
    pub pods_processed: AtomicU64,

    /// Pods skipped or failed inside their pipeline
    pub pod_failures: AtomicU64,

    /// Node/snapshot writes that failed
    pub persist_failures: AtomicU64,

    /// External geolocation lookups spent
    pub geo_lookups: AtomicU64,

    /// Credits feed fetches that failed
    pub credits_feed_failures: AtomicU64,

    /// Pods processed by the most recent run
    pub last_run_processed: AtomicU64,

    /// Unix timestamp of the most recent completed or failed run
    pub last_run_timestamp: AtomicU64,
}

impl IndexerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    pub fn inc_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pods_discovered(&self, count: u64) {
        self.pods_discovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_pods_processed(&self) {
        self.pods_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pod_failures(&self) {
        self.pod_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_persist_failures(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_geo_lookups(&self) {
        self.geo_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_credits_feed_failures(&self, count: u64) {
        self.credits_feed_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn set_last_run(&self, processed: u64, timestamp: u64) {
        self.last_run_processed.store(processed, Ordering::Relaxed);
        self.last_run_timestamp.store(timestamp, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# HELP pod_indexer_uptime_seconds Indexer service uptime in seconds\n\
             # TYPE pod_indexer_uptime_seconds gauge\n\
             pod_indexer_uptime_seconds {}\n\n",
            self.uptime_secs()
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_runs_started_total Indexing runs started\n\
             # TYPE pod_indexer_runs_started_total counter\n\
             pod_indexer_runs_started_total {}\n\n",
            self.runs_started.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_runs_completed_total Indexing runs completed\n\
             # TYPE pod_indexer_runs_completed_total counter\n\
             pod_indexer_runs_completed_total {}\n\n",
            self.runs_completed.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_runs_failed_total Indexing runs failed at discovery\n\
             # TYPE pod_indexer_runs_failed_total counter\n\
             pod_indexer_runs_failed_total {}\n\n",
            self.runs_failed.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_pods_discovered_total Pods returned by discovery\n\
             # TYPE pod_indexer_pods_discovered_total counter\n\
             pod_indexer_pods_discovered_total {}\n\n",
            self.pods_discovered.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_pods_processed_total Pods enriched, scored and persisted\n\
             # TYPE pod_indexer_pods_processed_total counter\n\
             pod_indexer_pods_processed_total {}\n\n",
            self.pods_processed.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_pod_failures_total Pod pipelines skipped or failed\n\
             # TYPE pod_indexer_pod_failures_total counter\n\
             pod_indexer_pod_failures_total {}\n\n",
            self.pod_failures.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_persist_failures_total Node or snapshot writes that failed\n\
             # TYPE pod_indexer_persist_failures_total counter\n\
             pod_indexer_persist_failures_total {}\n\n",
            self.persist_failures.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_geo_lookups_total External geolocation lookups spent\n\
             # TYPE pod_indexer_geo_lookups_total counter\n\
             pod_indexer_geo_lookups_total {}\n\n",
            self.geo_lookups.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_credits_feed_failures_total Credits feed fetches that failed\n\
             # TYPE pod_indexer_credits_feed_failures_total counter\n\
             pod_indexer_credits_feed_failures_total {}\n\n",
            self.credits_feed_failures.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_last_run_processed Pods processed by the most recent run\n\
             # TYPE pod_indexer_last_run_processed gauge\n\
             pod_indexer_last_run_processed {}\n\n",
            self.last_run_processed.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP pod_indexer_last_run_timestamp Unix time of the most recent run\n\
             # TYPE pod_indexer_last_run_timestamp gauge\n\
             pod_indexer_last_run_timestamp {}\n\n",
            self.last_run_timestamp.load(Ordering::Relaxed)
        ));

        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_secs": self.uptime_secs(),
            "runs": {
                "started": self.runs_started.load(Ordering::Relaxed),
                "completed": self.runs_completed.load(Ordering::Relaxed),
                "failed": self.runs_failed.load(Ordering::Relaxed),
            },
            "pods": {
                "discovered": self.pods_discovered.load(Ordering::Relaxed),
                "processed": self.pods_processed.load(Ordering::Relaxed),
                "failures": self.pod_failures.load(Ordering::Relaxed),
            },
            "persist_failures": self.persist_failures.load(Ordering::Relaxed),
            "geo_lookups": self.geo_lookups.load(Ordering::Relaxed),
            "credits_feed_failures": self.credits_feed_failures.load(Ordering::Relaxed),
            "last_run": {
                "processed": self.last_run_processed.load(Ordering::Relaxed),
                "timestamp": self.last_run_timestamp.load(Ordering::Relaxed),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = IndexerMetrics::new();

        metrics.inc_runs_started();
        metrics.inc_runs_started();
        metrics.inc_pods_processed();

        assert_eq!(metrics.runs_started.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.pods_processed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = IndexerMetrics::new();
        metrics.add_pods_discovered(42);
        metrics.set_last_run(40, 1_700_000_000);

        let output = metrics.to_prometheus();

        assert!(output.contains("pod_indexer_pods_discovered_total 42"));
        assert!(output.contains("pod_indexer_last_run_processed 40"));
    }

    #[test]
    fn test_json_format() {
        let metrics = IndexerMetrics::new();
        metrics.inc_pod_failures();

        let json = metrics.to_json();

        assert_eq!(json["pods"]["failures"], 1);
    }
}
