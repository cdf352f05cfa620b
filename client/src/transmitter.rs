//! Rate-limited transmission of the local player's state.

use crate::registry::LocalEntityState;
use crate::transport::Transport;
use crate::utils::round_wire;
use log::debug;
use protocol::{Body, Envelope, PlayerStateData};

/// Samples the local entity once per tick and puts the freshest sample on the
/// wire whenever the send interval has elapsed. Only the latest continuous
/// sample survives a tick; discrete events bypass the limiter entirely.
pub struct StateTransmitter {
    interval_ms: u64,
    accumulator_ms: u64,
    last_tick_ms: Option<u64>,
    pending: Option<PlayerStateData>,
    states_sent: u64,
    events_sent: u64,
}

impl StateTransmitter {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            accumulator_ms: 0,
            last_tick_ms: None,
            pending: None,
            states_sent: 0,
            events_sent: 0,
        }
    }

    /// Invoked once per tick with the freshest local sample.
    ///
    /// An unavailable transport is not an error: the send is skipped and the
    /// next tick's sample supersedes this one, so no backlog accumulates.
    pub fn sample_and_maybe_send(
        &mut self,
        local: &LocalEntityState,
        now_ms: u64,
        transport: &dyn Transport,
    ) {
        let elapsed = match self.last_tick_ms {
            Some(last) => now_ms.saturating_sub(last),
            None => self.interval_ms,
        };
        self.last_tick_ms = Some(now_ms);
        self.accumulator_ms = self.accumulator_ms.saturating_add(elapsed);

        // freshest continuous sample per tick; older pending state is
        // superseded, never queued
        self.pending = Some(PlayerStateData {
            x: round_wire(local.x),
            y: round_wire(local.y),
            vx: round_wire(local.vx),
            vy: round_wire(local.vy),
            animation: local.animation.clone(),
            facing_right: local.facing_right,
        });

        if self.accumulator_ms < self.interval_ms {
            return;
        }
        if !transport.is_ready() {
            debug!("transport not ready, skipping state send");
            return;
        }
        if let Some(state) = self.pending.take() {
            if transport.send(&Envelope::new(Body::PlayerState(state), now_ms)) {
                self.states_sent += 1;
            }
        }
        self.accumulator_ms = 0;
    }

    /// Sends a discrete action (attack, etc.) immediately.
    pub fn send_event(&mut self, body: Body, now_ms: u64, transport: &dyn Transport) {
        if !transport.is_ready() {
            debug!("transport not ready, dropping event send");
            return;
        }
        if transport.send(&Envelope::new(body, now_ms)) {
            self.events_sent += 1;
        }
    }

    pub fn states_sent(&self) -> u64 {
        self.states_sent
    }

    pub fn events_sent(&self) -> u64 {
        self.events_sent
    }
}
