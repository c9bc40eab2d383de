//! Entry-Node Discovery
//!
//! Walks the bootstrap list for a logical network and returns the pod set
//! from the first entry node that answers. Each address gets two chances:
//! the rich `get-pods-with-stats` method first, then the plain `get-pods`
//! method, before the walk moves on. There is exactly one pass over the
//! list; exhausting it fails the whole run.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::rpc::RpcClient;
use crate::types::RawPod;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no pods found from any entry node")]
    NoPodsFound,
}

/// Raw peer list plus the entry address that served it (diagnostics only)
#[derive(Debug)]
pub struct Discovery {
    pub pods: Vec<RawPod>,
    pub entry: String,
}

/// Query bootstrap addresses in order until one yields a non-empty pod list.
pub async fn discover(rpc: &RpcClient, bootstrap: &[String]) -> Result<Discovery, DiscoveryError> {
    for entry in bootstrap {
        match rpc.get_pods_with_stats(entry).await {
            Ok(pods) if !pods.is_empty() => {
                info!(entry = %entry, pods = pods.len(), "discovered pods with stats");
                return Ok(Discovery {
                    pods,
                    entry: entry.clone(),
                });
            }
            Ok(_) => {
                debug!(entry = %entry, "entry node returned empty pod list with stats");
            }
            Err(e) => {
                warn!(entry = %entry, error = %e, "get-pods-with-stats failed");
            }
        }

        // Same address, plainer method, before moving down the list
        match rpc.get_pods(entry).await {
            Ok(pods) if !pods.is_empty() => {
                info!(entry = %entry, pods = pods.len(), "discovered pods (basic)");
                return Ok(Discovery {
                    pods,
                    entry: entry.clone(),
                });
            }
            Ok(_) => {
                debug!(entry = %entry, "entry node returned empty pod list");
            }
            Err(e) => {
                warn!(entry = %entry, error = %e, "get-pods failed");
            }
        }
    }

    Err(DiscoveryError::NoPodsFound)
}
