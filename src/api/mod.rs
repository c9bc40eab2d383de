//! HTTP API
//!
//! Health, status, node listing, metrics, and the manual run trigger.

mod metrics;
mod routes;

pub use metrics::IndexerMetrics;
pub use routes::{router, run_api_server, ApiState};
