//! Tunable parameters for the synchronization core.

use protocol::{
    CORRECTION_EPSILON, CORRECTION_RATE, DEFAULT_INTERPOLATION_DELAY_MS, DEFAULT_SEND_INTERVAL_MS,
    EXTRAPOLATION_THRESHOLD_MS, MAX_EXTRAPOLATION_MS, MAX_INTERPOLATION_DELAY_MS,
    PING_INTERVAL_MS, RECONCILE_SNAP_THRESHOLD, SNAPSHOT_BUFFER_CAPACITY,
};

/// Every knob the sync core exposes. Constructed once and injected; the core
/// never reads ambient configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum elapsed time between continuous-state sends.
    pub send_interval_ms: u64,
    /// Snapshots retained per remote entity.
    pub snapshot_capacity: usize,
    /// Floor for the render delay behind real time.
    pub interpolation_delay_ms: u64,
    /// Ceiling for the adaptive render delay.
    pub max_interpolation_delay_ms: u64,
    /// Buffer staleness beyond which dead reckoning takes over.
    pub extrapolation_threshold_ms: u64,
    /// Cap on dead-reckoning projection time.
    pub max_extrapolation_ms: u64,
    /// Local prediction error (px) beyond which the server position is snapped.
    pub reconcile_threshold: f32,
    /// Latency probe cadence.
    pub ping_interval_ms: u64,
    /// Fraction of residual extrapolation error corrected per tick.
    pub correction_rate: f32,
    /// Residual error (px) below which correction stops blending.
    pub correction_epsilon: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            send_interval_ms: DEFAULT_SEND_INTERVAL_MS,
            snapshot_capacity: SNAPSHOT_BUFFER_CAPACITY,
            interpolation_delay_ms: DEFAULT_INTERPOLATION_DELAY_MS,
            max_interpolation_delay_ms: MAX_INTERPOLATION_DELAY_MS,
            extrapolation_threshold_ms: EXTRAPOLATION_THRESHOLD_MS,
            max_extrapolation_ms: MAX_EXTRAPOLATION_MS,
            reconcile_threshold: RECONCILE_SNAP_THRESHOLD,
            ping_interval_ms: PING_INTERVAL_MS,
            correction_rate: CORRECTION_RATE,
            correction_epsilon: CORRECTION_EPSILON,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = SyncConfig::default();
        assert_eq!(config.send_interval_ms, 16);
        assert_eq!(config.interpolation_delay_ms, 100);
        assert_eq!(config.max_interpolation_delay_ms, 300);
        assert_eq!(config.extrapolation_threshold_ms, 100);
        assert_eq!(config.max_extrapolation_ms, 300);
        assert_eq!(config.reconcile_threshold, 50.0);
        assert_eq!(config.snapshot_capacity, 10);
    }
}
