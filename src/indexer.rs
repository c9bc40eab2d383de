//! Concurrency Orchestrator
//!
//! Drives one indexing run: discovery once, then the per-pod pipeline
//! (normalize -> enrich -> score -> persist) fanned out over every
//! discovered pod under a semaphore bound. Pipelines are independent and
//! complete in any order; one pod failing never touches its siblings.
//! The entry point always returns a report, never an error.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::api::IndexerMetrics;
use crate::config::IndexerConfig;
use crate::context::NetworkContext;
use crate::credits::{CreditsClient, CreditsTable};
use crate::discovery;
use crate::enrich::{EnrichError, Enricher};
use crate::geo::GeoClient;
use crate::normalize::normalize;
use crate::rpc::RpcClient;
use crate::scoring;
use crate::store::{NodeStore, StoreError};
use crate::types::{Network, PodStats, RunPhase, RunReport, RunStatus};

/// Anything that can end one pod's pipeline early
#[derive(Debug, Error)]
enum PodError {
    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    Persist(#[from] StoreError),
}

/// One indexer instance owns its HTTP clients and store handle; there is
/// no process-global state. Safe to invoke concurrently with itself —
/// duplicate runs produce duplicate snapshots, not corrupted rows.
pub struct Indexer {
    config: Arc<IndexerConfig>,
    store: Arc<dyn NodeStore>,
    rpc: Arc<RpcClient>,
    geo: Arc<GeoClient>,
    credits: CreditsClient,
    metrics: Arc<IndexerMetrics>,
    status: RwLock<RunStatus>,
}

impl Indexer {
    pub fn new(
        config: Arc<IndexerConfig>,
        store: Arc<dyn NodeStore>,
        metrics: Arc<IndexerMetrics>,
    ) -> anyhow::Result<Self> {
        // One pooled HTTP client shared by every outbound concern
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            rpc: Arc::new(RpcClient::new(client.clone(), &config)),
            geo: Arc::new(GeoClient::new(client.clone(), &config)),
            credits: CreditsClient::new(client, &config),
            config,
            store,
            metrics,
            status: RwLock::new(RunStatus::default()),
        })
    }

    pub async fn status(&self) -> RunStatus {
        self.status.read().await.clone()
    }

    /// Run one indexing pass for a logical network.
    pub async fn run(&self, network: Network) -> RunReport {
        let started_at = Utc::now();
        self.metrics.inc_runs_started();
        self.set_phase(RunPhase::Discovering).await;
        info!(network = %network, "starting indexing run");

        let discovered =
            match discovery::discover(&self.rpc, self.config.bootstrap_for(network)).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(network = %network, error = %e, "indexing run failed");
                    self.metrics.inc_runs_failed();
                    let report = RunReport::failed(network, started_at, e.to_string());
                    self.finish(RunPhase::Failed, report.clone()).await;
                    return report;
                }
            };

        let pods: Vec<PodStats> = discovered.pods.iter().map(normalize).collect();
        self.metrics.add_pods_discovered(pods.len() as u64);

        // Credits and scoring context are prepared once, before the fan-out
        let credits = self.credits.fetch().await;
        self.metrics
            .add_credits_feed_failures(credits.feeds_failed as u64);

        let country_counts = match self.store.country_counts().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "country history unavailable, scoring without it");
                Default::default()
            }
        };
        let context = Arc::new(NetworkContext::build(country_counts, &pods));
        let credits = Arc::new(credits);

        self.set_phase(RunPhase::Enriching).await;
        info!(
            network = %network,
            pods = pods.len(),
            entry = %discovered.entry,
            concurrency = self.config.concurrency,
            "enriching discovered pods"
        );

        let enricher = Arc::new(Enricher::new(
            self.rpc.clone(),
            self.geo.clone(),
            self.store.clone(),
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();

        for stats in pods.iter().cloned() {
            // Backpressure: wait for a slot before spawning the next pipeline
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let enricher = enricher.clone();
            let store = self.store.clone();
            let credits = credits.clone();
            let context = context.clone();
            let metrics = self.metrics.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let label = if stats.pubkey.is_empty() {
                    stats.address.clone()
                } else {
                    stats.pubkey.clone()
                };

                match process_pod(&enricher, store.as_ref(), &credits, &context, &metrics, &stats)
                    .await
                {
                    Ok(()) => {
                        metrics.inc_pods_processed();
                        true
                    }
                    Err(PodError::Enrich(EnrichError::Skipped)) => {
                        debug!(pod = %label, "skipping pod without identity or address");
                        metrics.inc_pod_failures();
                        false
                    }
                    Err(PodError::Persist(e)) => {
                        warn!(pod = %label, error = %e, "failed to persist pod");
                        metrics.inc_persist_failures();
                        metrics.inc_pod_failures();
                        false
                    }
                    Err(e) => {
                        warn!(pod = %label, error = %e, "pod pipeline failed");
                        metrics.inc_pod_failures();
                        false
                    }
                }
            });
        }

        let mut processed = 0usize;
        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => processed += 1,
                Ok(false) => failed += 1,
                Err(e) => {
                    warn!(error = %e, "pod pipeline task aborted");
                    self.metrics.inc_pod_failures();
                    failed += 1;
                }
            }
        }

        let report = RunReport {
            network,
            success: true,
            discovered: pods.len(),
            processed,
            failed,
            entry: Some(discovered.entry),
            message: None,
            started_at,
            finished_at: Utc::now(),
        };

        self.metrics.inc_runs_completed();
        self.metrics
            .set_last_run(processed as u64, report.finished_at.timestamp().max(0) as u64);
        info!(network = %network, processed, failed, "indexing run complete");
        self.finish(RunPhase::Completed, report.clone()).await;

        report
    }

    async fn set_phase(&self, phase: RunPhase) {
        self.status.write().await.phase = phase;
    }

    async fn finish(&self, phase: RunPhase, report: RunReport) {
        let mut status = self.status.write().await;
        status.phase = phase;
        status.last_report = Some(report);
    }
}

/// One pod's pipeline: enrich, score, persist. Steps are sequential
/// because each feeds the next.
async fn process_pod(
    enricher: &Enricher,
    store: &dyn NodeStore,
    credits: &CreditsTable,
    context: &NetworkContext,
    metrics: &IndexerMetrics,
    stats: &PodStats,
) -> Result<(), PodError> {
    let enriched = enricher.enrich(stats, credits).await?;
    if enriched.geo_looked_up {
        metrics.inc_geo_lookups();
    }

    let breakdown = scoring::composite(&enriched.score_input(), context);

    store.upsert_node(enriched.node_update()).await?;
    store
        .insert_snapshot(enriched.snapshot(breakdown.total))
        .await?;

    Ok(())
}
