//! Composite Scoring Engine
//!
//! Turns one pod's telemetry plus network-wide context into a 0-100
//! composite score: the unweighted average of reliability, performance,
//! decentralization and version sub-scores. Everything here is pure —
//! identical inputs always produce identical output, which is what makes
//! score regressions diffable across runs.

use crate::context::NetworkContext;

/// Uptime target for a full reliability score (7 days)
pub const RELIABILITY_TARGET_DAYS: f64 = 7.0;

/// Reliability floor for pods that are gossip-visible but hide their
/// stats; being discoverable is worth more than zero
pub const RELIABILITY_FLOOR: f64 = 20.0;

/// RAM capacity target for a full RAM sub-term (64 GB)
pub const RAM_TARGET_GB: f64 = 64.0;

/// RAM capacity at or below which the RAM sub-term is zero (8 GB)
pub const RAM_FLOOR_GB: f64 = 8.0;

/// Committed-storage target for a full storage sub-term (1 TB)
pub const STORAGE_TARGET_GB: f64 = 1000.0;

/// Decimal gigabyte, the unit the targets are expressed in
pub const GB: f64 = 1_000_000_000.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Telemetry slice the score depends on
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub uptime_seconds: f64,
    pub ram_total: f64,
    pub storage_used: f64,
    pub version: &'a str,
    pub country: Option<&'a str>,
}

/// Per-factor breakdown; `total` is the arithmetic mean of the four
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub reliability: f64,
    pub performance: f64,
    pub decentralization: f64,
    pub version: f64,
    pub total: f64,
}

/// Compute the composite score for one pod.
pub fn composite(input: &ScoreInput<'_>, context: &NetworkContext) -> ScoreBreakdown {
    let reliability = reliability_score(input.uptime_seconds);
    let performance = performance_score(input.ram_total, input.storage_used);
    let decentralization = decentralization_score(input.country, context);
    let version = version_score(input.version);

    ScoreBreakdown {
        reliability,
        performance,
        decentralization,
        version,
        total: (reliability + performance + decentralization + version) / 4.0,
    }
}

/// Uptime-based reliability: linear up to the 7-day target, capped at 100.
///
/// A computed 0 is floored to 20: a pod that appears in gossip but
/// reports no uptime is hiding stats, not absent.
pub fn reliability_score(uptime_seconds: f64) -> f64 {
    let days = uptime_seconds.max(0.0) / SECONDS_PER_DAY;

    let score = if days >= RELIABILITY_TARGET_DAYS {
        100.0
    } else {
        (days / RELIABILITY_TARGET_DAYS) * 100.0
    };

    if score == 0.0 {
        RELIABILITY_FLOOR
    } else {
        score
    }
}

/// Resource capacity: even split of a RAM term and a storage term.
///
/// RAM: 100 at or above 64 GB, 0 at or below 8 GB (the floor wins at
/// exactly 8 GB), linear `(ram_gb / 64) * 100` in between.
/// Storage: 100 at or above 1 TB, linear `(storage_gb / 1000) * 100` below.
pub fn performance_score(ram_total: f64, storage_used: f64) -> f64 {
    let ram_gb = ram_total / GB;
    let ram_term = if ram_gb >= RAM_TARGET_GB {
        100.0
    } else if ram_gb <= RAM_FLOOR_GB {
        0.0
    } else {
        (ram_gb / RAM_TARGET_GB) * 100.0
    };

    let storage_gb = storage_used.max(0.0) / GB;
    let storage_term = if storage_gb >= STORAGE_TARGET_GB {
        100.0
    } else {
        (storage_gb / STORAGE_TARGET_GB) * 100.0
    };

    (ram_term + storage_term) / 2.0
}

/// Geographic concentration penalty.
///
/// Concentration is this country's share of all known-country nodes:
/// under 10% scores 100, under 30% scores 50, anything denser scores 0.
/// Unknown country or an empty historical sample defaults to 100 —
/// insufficient data is not a penalty.
pub fn decentralization_score(country: Option<&str>, context: &NetworkContext) -> f64 {
    let Some(country) = country else {
        return 100.0;
    };

    if country.is_empty() || country == "Unknown" || context.total_known_countries == 0 {
        return 100.0;
    }

    let count = context.country_count(country);
    let concentration = count as f64 / context.total_known_countries as f64;

    if concentration < 0.10 {
        100.0
    } else if concentration < 0.30 {
        50.0
    } else {
        0.0
    }
}

/// Version currency, parsed as `major.minor`.
///
/// Major >= 1 scores 100; major 0 scores 100 from minor 7 up, 20 at
/// minor 6, 0 below. Unparsable or sentinel versions score 0.
pub fn version_score(version: &str) -> f64 {
    if version.is_empty() || version.eq_ignore_ascii_case("unknown") {
        return 0.0;
    }

    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() < 2 {
        return 0.0;
    }

    let Some(major) = parts[0].trim().parse::<u32>().ok() else {
        return 0.0;
    };

    if major >= 1 {
        return 100.0;
    }

    match parts[1].trim().parse::<u32>() {
        Ok(minor) if minor >= 7 => 100.0,
        Ok(6) => 20.0,
        _ => 0.0,
    }
}
