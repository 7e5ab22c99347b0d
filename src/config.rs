use serde::{Deserialize, Serialize};

/// Pipeline tunables. All fields have defaults so a partial config file or
/// flag set deserializes cleanly.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Displacement (meters) the DOP-scaled gate value must exceed before
    /// motion is recomputed.
    pub min_distance_m: f64,
    /// PDOP pivot for the gate; also floors the gate denominator.
    pub pdop_threshold: f64,
    /// Minimum elapsed time between inserted (not overwritten) rows.
    pub log_interval_ms: i64,
    /// Minimum interval between aggregation ticks.
    pub tick_interval_ms: i64,
    /// Minimum elapsed time between satellite snapshot writes.
    pub satellite_interval_ms: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            min_distance_m: 20.0,
            pdop_threshold: 3.0,
            log_interval_ms: 30_000,
            tick_interval_ms: 1000,
            satellite_interval_ms: 30_000,
        }
    }
}
