//! Stat Normalizer
//!
//! Pure mapping from the heterogeneous pod records entry nodes return to
//! the one canonical telemetry shape the rest of the pipeline consumes.
//! All tolerance for RPC-server field drift lives here; scoring and
//! persistence never see an optional numeric field.

use crate::types::{PodStats, RawPod};

/// Version sentinel for pods that report none
pub const UNKNOWN_VERSION: &str = "unknown";

/// Status sentinel for pods that report none
pub const UNKNOWN_STATUS: &str = "unknown";

/// RPC control port assumed when a record carries a bare IP
pub const DEFAULT_RPC_PORT: u16 = 6000;

/// RAM total estimated from RAM used when the record reports only usage
pub const RAM_TOTAL_FALLBACK_MULTIPLIER: f64 = 1.5;

/// RAM total assumed when the record reports neither total nor usage (8 GiB)
pub const DEFAULT_RAM_TOTAL_BYTES: f64 = 8_589_934_592.0;

/// Normalize one raw discovery record.
///
/// Idempotent and side-effect-free. Field fallbacks, in order:
/// - identity: `id`, then `pubkey`
/// - address: `address`, then `ip` (+ `port` or the default)
/// - cpu: `cpu`, then `cpu_percent`
/// - ram used: `memory`, then `memory_used`
/// - ram total: `memory_total`, then used x multiplier, then 8 GiB
/// - storage: `storage_committed`, then `storage_used`
///
/// Missing numerics become zero, never null.
pub fn normalize(raw: &RawPod) -> PodStats {
    let pubkey = raw
        .id
        .clone()
        .or_else(|| raw.pubkey.clone())
        .unwrap_or_default();

    let address = raw.address.clone().unwrap_or_else(|| match &raw.ip {
        Some(ip) => format!("{}:{}", ip, raw.port.unwrap_or(DEFAULT_RPC_PORT)),
        None => String::new(),
    });

    let cpu_percent = raw.cpu.or(raw.cpu_percent).unwrap_or(0.0);
    let ram_used = raw.memory.or(raw.memory_used).unwrap_or(0.0);

    let ram_total = raw.memory_total.unwrap_or(if ram_used > 0.0 {
        ram_used * RAM_TOTAL_FALLBACK_MULTIPLIER
    } else {
        DEFAULT_RAM_TOTAL_BYTES
    });

    let storage_used = raw.storage_committed.or(raw.storage_used).unwrap_or(0.0);

    PodStats {
        pubkey,
        address,
        cpu_percent,
        ram_used,
        ram_total,
        uptime_seconds: raw.uptime.unwrap_or(0.0),
        storage_used,
        version: raw
            .version
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
        status: raw
            .status
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
    }
}
