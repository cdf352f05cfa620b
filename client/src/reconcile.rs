//! Server reconciliation for the locally predicted player.
//!
//! The local avatar moves on prediction alone; whenever the server's
//! authoritative view of it arrives, the divergence is measured and either
//! trusted (small error) or snapped hard to the server value (large error).
//! The snap is immediate and total: a rare visible pop is preferred over
//! creeping drift.

use crate::utils::distance;
use log::{debug, warn};
use protocol::{PlayerEntry, CORRECTION_RATE};

/// Prediction bookkeeping for the local player. Reset on respawn.
#[derive(Debug, Clone)]
pub struct LocalPredictionState {
    pub predicted_x: f32,
    pub predicted_y: f32,
    pub last_error: (f32, f32),
    /// Reserved for a smoothed local-correction policy; the snap path does
    /// not consume it.
    pub correction_rate: f32,
}

impl LocalPredictionState {
    pub fn new() -> Self {
        Self {
            predicted_x: 0.0,
            predicted_y: 0.0,
            last_error: (0.0, 0.0),
            correction_rate: CORRECTION_RATE,
        }
    }
}

impl Default for LocalPredictionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    /// Error within threshold; the prediction stands.
    Trusted { error: f32 },
    /// Error past threshold; local position snapped to the server value.
    Snapped { error: f32, x: f32, y: f32 },
    /// Malformed server entry; nothing applied this tick.
    Skipped,
}

pub struct Reconciler {
    threshold: f32,
    state: LocalPredictionState,
}

impl Reconciler {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: LocalPredictionState::new(),
        }
    }

    pub fn state(&self) -> &LocalPredictionState {
        &self.state
    }

    /// Compares the server's authoritative entry for the local player against
    /// the current predicted position.
    ///
    /// Entries missing position or velocity are skipped and logged; the tick
    /// loop carries on with the prediction it has.
    pub fn reconcile(
        &mut self,
        entry: &PlayerEntry,
        predicted_x: f32,
        predicted_y: f32,
    ) -> Reconciliation {
        let (sx, sy) = match (entry.x, entry.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => (x, y),
            _ => {
                warn!("skipping reconciliation: malformed position in server state");
                return Reconciliation::Skipped;
            }
        };
        match (entry.vx, entry.vy) {
            (Some(vx), Some(vy)) if vx.is_finite() && vy.is_finite() => {}
            _ => {
                warn!("skipping reconciliation: malformed velocity in server state");
                return Reconciliation::Skipped;
            }
        }

        self.state.predicted_x = predicted_x;
        self.state.predicted_y = predicted_y;
        self.state.last_error = (sx - predicted_x, sy - predicted_y);

        let error = distance(predicted_x, predicted_y, sx, sy);
        if error > self.threshold {
            debug!("Reconciliation snap: error={:.2}px", error);
            self.state.predicted_x = sx;
            self.state.predicted_y = sy;
            Reconciliation::Snapped { error, x: sx, y: sy }
        } else {
            Reconciliation::Trusted { error }
        }
    }

    /// Applies a server-issued forced correction: always a snap, regardless
    /// of divergence.
    pub fn apply_forced_correction(
        &mut self,
        x: f32,
        y: f32,
        predicted_x: f32,
        predicted_y: f32,
    ) -> Reconciliation {
        let error = distance(predicted_x, predicted_y, x, y);
        debug!("Forced correction: error={:.2}px", error);
        self.state.last_error = (x - predicted_x, y - predicted_y);
        self.state.predicted_x = x;
        self.state.predicted_y = y;
        Reconciliation::Snapped { error, x, y }
    }

    /// Resets prediction state at a respawn point.
    pub fn reset(&mut self, x: f32, y: f32) {
        self.state.predicted_x = x;
        self.state.predicted_y = y;
        self.state.last_error = (0.0, 0.0);
    }
}
