//! Round-trip latency probing and the adaptive interpolation delay.

use crate::transport::Transport;
use log::debug;
use protocol::{Body, Envelope, PingData, RTT_DELAY_FACTOR};

/// Sends a timestamped ping on a fixed cadence and derives the interpolation
/// delay from the newest round trip.
///
/// There is no state machine beyond one probe in flight: an unanswered probe
/// simply expires when the next one is scheduled.
pub struct LatencyProbe {
    ping_interval_ms: u64,
    since_last_ping_ms: u64,
    last_tick_ms: Option<u64>,
    in_flight: Option<u64>,
    latency_ms: u64,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl LatencyProbe {
    pub fn new(ping_interval_ms: u64, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            ping_interval_ms,
            since_last_ping_ms: 0,
            last_tick_ms: None,
            in_flight: None,
            latency_ms: 0,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Advances the probe timer one tick; sends a ping when the cadence
    /// elapses. A still-unanswered previous probe is superseded.
    pub fn advance(&mut self, now_ms: u64, transport: &dyn Transport) {
        let elapsed = match self.last_tick_ms {
            Some(last) => now_ms.saturating_sub(last),
            None => self.ping_interval_ms,
        };
        self.last_tick_ms = Some(now_ms);
        self.since_last_ping_ms = self.since_last_ping_ms.saturating_add(elapsed);

        if self.since_last_ping_ms < self.ping_interval_ms {
            return;
        }
        if self.in_flight.is_some() {
            debug!("latency probe unanswered, superseding");
        }
        if transport.is_ready() {
            transport.send(&Envelope::new(
                Body::Ping(PingData { timestamp: now_ms }),
                now_ms,
            ));
            self.in_flight = Some(now_ms);
        }
        self.since_last_ping_ms = 0;
    }

    /// Handles a pong carrying the echoed probe timestamp.
    pub fn on_pong(&mut self, echoed_timestamp: u64, now_ms: u64) {
        self.latency_ms = now_ms.saturating_sub(echoed_timestamp);
        self.in_flight = None;
    }

    /// Newest measured round-trip time in milliseconds.
    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Render delay for the interpolator: raised to `RTT * 1.5` once RTT
    /// exceeds the floor, capped at the maximum.
    pub fn interpolation_delay_ms(&self) -> u64 {
        if self.latency_ms > self.base_delay_ms {
            ((self.latency_ms as f32 * RTT_DELAY_FACTOR) as u64).min(self.max_delay_ms)
        } else {
            self.base_delay_ms
        }
    }
}
