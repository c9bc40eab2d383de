//! Network Context
//!
//! Ephemeral network-wide view recomputed at the start of each run and
//! fed to the scoring engine: how nodes are spread across countries (from
//! rows already persisted) and which software versions the discovered
//! peer set is running. Never persisted itself.

use std::collections::HashMap;
use tracing::debug;

use crate::normalize::UNKNOWN_VERSION;
use crate::types::PodStats;

#[derive(Debug, Clone, Default)]
pub struct NetworkContext {
    /// Known-country node counts from previously persisted rows
    country_counts: HashMap<String, u64>,

    /// Sum of all known-country counts
    pub total_known_countries: u64,

    /// Version histogram over the current discovery set
    pub version_counts: HashMap<String, u64>,

    /// Version run by the most peers, when any peer reported one
    pub most_common_version: Option<String>,
}

impl NetworkContext {
    /// Build the context for one run from stored country counts and the
    /// normalized discovery set.
    pub fn build(country_counts: HashMap<String, u64>, pods: &[PodStats]) -> Self {
        let mut context = Self::from_country_counts(country_counts);

        for pod in pods {
            if pod.version == UNKNOWN_VERSION {
                continue;
            }
            *context.version_counts.entry(pod.version.clone()).or_insert(0) += 1;
        }

        // Ties break lexicographically so the winner is stable across runs
        let winner = context
            .version_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
            .map(|(version, _)| version.clone());
        context.most_common_version = winner;

        if let Some(version) = &context.most_common_version {
            debug!(version = %version, "network-wide most common version");
        }

        context
    }

    /// Context with only geographic data, no version information
    pub fn from_country_counts(country_counts: HashMap<String, u64>) -> Self {
        let total_known_countries = country_counts.values().sum();
        Self {
            country_counts,
            total_known_countries,
            version_counts: HashMap::new(),
            most_common_version: None,
        }
    }

    pub fn country_count(&self, country: &str) -> u64 {
        self.country_counts.get(country).copied().unwrap_or(0)
    }
}
