//! Interpolation and dead-reckoning extrapolation for remote entities.
//!
//! Rendering runs slightly behind real time so two buffered snapshots usually
//! bracket the render instant. When the buffer goes stale the position is
//! projected forward from the last known velocity instead, and once real data
//! returns the accumulated projection error is blended out rather than
//! snapped, so a lag spike never ends in a visible teleport.

use crate::config::SyncConfig;
use crate::registry::RenderState;
use crate::snapshot::{Snapshot, SnapshotBuffer};
use log::debug;

/// Result of sampling a buffer at a render time.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Two snapshots bracket the render time; position is blended between
    /// them, discrete fields snap to the later one.
    Blended(RenderState),
    /// Render time precedes everything buffered; clamped to the oldest entry.
    ClampedOldest(RenderState),
    /// Render time has run past the newest entry.
    Stale,
    /// Nothing buffered.
    Empty,
}

fn lerp(start: f32, end: f32, alpha: f32) -> f32 {
    start + (end - start) * alpha
}

fn state_of(snapshot: &Snapshot) -> RenderState {
    RenderState {
        x: snapshot.x,
        y: snapshot.y,
        animation: snapshot.animation.clone(),
        facing_right: snapshot.facing_right,
    }
}

/// Samples the buffer at `render_time` (sender clock domain).
///
/// Pure: an identical buffer and render time always produce the identical
/// sample.
pub fn sample(buffer: &SnapshotBuffer, render_time: u64) -> Sample {
    let (before, after) = buffer.bracket(render_time);
    match (before, after) {
        (Some(a), Some(b)) => {
            let span = (b.sender_timestamp - a.sender_timestamp) as f32;
            let alpha = if span > 0.0 {
                (render_time - a.sender_timestamp) as f32 / span
            } else {
                0.0
            }
            .clamp(0.0, 1.0);

            Sample::Blended(RenderState {
                x: lerp(a.x, b.x, alpha),
                y: lerp(a.y, b.y, alpha),
                // discrete state has no meaningful in-between
                animation: b.animation.clone(),
                facing_right: b.facing_right,
            })
        }
        (Some(a), None) if a.sender_timestamp == render_time => Sample::Blended(state_of(a)),
        (Some(_), None) => Sample::Stale,
        (None, Some(oldest)) => Sample::ClampedOldest(state_of(oldest)),
        (None, None) => Sample::Empty,
    }
}

/// Projects forward from the freshest snapshot using its velocity, capped at
/// `max_extrapolation_ms` so a peer that stopped sending stops moving.
pub fn extrapolate(last: &Snapshot, elapsed_ms: u64, max_extrapolation_ms: u64) -> (f32, f32) {
    let t = elapsed_ms.min(max_extrapolation_ms) as f32 / 1000.0;
    (last.x + last.vx * t, last.y + last.vy * t)
}

/// Per-remote-entity synchronization state: the receive buffer plus the
/// derived render position and dead-reckoning error bookkeeping.
///
/// Created when a remote entity joins the session, dropped atomically when it
/// leaves.
#[derive(Debug)]
pub struct RemoteEntityChannel {
    buffer: SnapshotBuffer,
    /// Set while dead reckoning; blended back toward real data on return.
    predicted: Option<(f32, f32)>,
    extrapolating: bool,
}

impl RemoteEntityChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: SnapshotBuffer::new(capacity),
            predicted: None,
            extrapolating: false,
        }
    }

    pub fn ingest(&mut self, snapshot: Snapshot) -> bool {
        self.buffer.ingest(snapshot)
    }

    pub fn buffer(&self) -> &SnapshotBuffer {
        &self.buffer
    }

    pub fn is_extrapolating(&self) -> bool {
        self.extrapolating
    }

    /// Advances the render state one tick.
    ///
    /// `now_ms` is the receiver clock and `delay_ms` the interpolation delay
    /// supplied by the latency probe. Returns nothing until a first snapshot
    /// has arrived.
    pub fn advance(&mut self, now_ms: u64, delay_ms: u64, config: &SyncConfig) -> Option<RenderState> {
        let newest = self.buffer.newest()?.clone();
        let lag_ms = now_ms.saturating_sub(newest.received_at);

        if lag_ms > config.extrapolation_threshold_ms {
            // buffer has gone stale: dead-reckon from the freshest snapshot
            let (x, y) = extrapolate(&newest, lag_ms, config.max_extrapolation_ms);
            if !self.extrapolating {
                debug!("extrapolating {} (lag: {}ms)", newest.entity_id, lag_ms);
            }
            self.predicted = Some((x, y));
            self.extrapolating = true;
            return Some(RenderState {
                x,
                y,
                animation: newest.animation,
                facing_right: newest.facing_right,
            });
        }
        self.extrapolating = false;

        // Play the sender's timeline back `delay_ms` behind its freshest
        // known point, advanced by receiver-local elapsed time. Sender
        // timestamps are only used relative to each other.
        let render_time = (newest.sender_timestamp + lag_ms).saturating_sub(delay_ms);
        let target = match sample(&self.buffer, render_time) {
            Sample::Blended(state) | Sample::ClampedOldest(state) => state,
            Sample::Stale => {
                let (x, y) = extrapolate(&newest, lag_ms, config.max_extrapolation_ms);
                RenderState {
                    x,
                    y,
                    animation: newest.animation,
                    facing_right: newest.facing_right,
                }
            }
            Sample::Empty => return None,
        };

        // Fresh data after a dead-reckoning stretch: ease the residual error
        // out instead of teleporting to the target.
        if let Some((px, py)) = self.predicted {
            let ex = target.x - px;
            let ey = target.y - py;
            let error = (ex * ex + ey * ey).sqrt();
            if error > config.correction_epsilon {
                let x = px + ex * config.correction_rate;
                let y = py + ey * config.correction_rate;
                self.predicted = Some((x, y));
                if error > 20.0 {
                    debug!("correcting prediction error: {:.1}px", error);
                }
                return Some(RenderState { x, y, ..target });
            }
            self.predicted = None;
        }

        Some(target)
    }
}
