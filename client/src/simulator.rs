//! Scripted loopback transport for tests and the demo binary.

use crate::transport::{InboxSender, Transport};
use protocol::Envelope;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::{Cell, RefCell};

/// A transport that records everything sent through it instead of touching a
/// network. Readiness is togglable to exercise degraded-link paths.
#[derive(Debug)]
pub struct SimulatedTransport {
    ready: Cell<bool>,
    sent: RefCell<Vec<Envelope>>,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self {
            ready: Cell::new(true),
            sent: RefCell::new(Vec::new()),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
    }

    /// Takes everything sent so far, clearing the log.
    pub fn take_sent(&self) -> Vec<Envelope> {
        std::mem::take(&mut self.sent.borrow_mut())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Transport for SimulatedTransport {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn send(&self, envelope: &Envelope) -> bool {
        if !self.ready.get() {
            return false;
        }
        self.sent.borrow_mut().push(envelope.clone());
        true
    }
}

/// One-way link with fixed base latency plus random jitter, scheduling
/// deliveries into an [`InboxSender`] at simulated arrival times.
pub struct JitteredLink {
    inbox: InboxSender,
    base_delay_ms: u64,
    jitter_ms: u64,
    rng: StdRng,
    in_flight: Vec<(u64, Envelope)>,
}

impl JitteredLink {
    pub fn new(inbox: InboxSender, base_delay_ms: u64, jitter_ms: u64, seed: u64) -> Self {
        Self {
            inbox,
            base_delay_ms,
            jitter_ms,
            rng: StdRng::seed_from_u64(seed),
            in_flight: Vec::new(),
        }
    }

    /// Accepts a message for delayed delivery.
    pub fn submit(&mut self, envelope: Envelope, now_ms: u64) {
        let jitter = if self.jitter_ms > 0 {
            self.rng.gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        let deliver_at = now_ms + self.base_delay_ms + jitter;
        self.in_flight.push((deliver_at, envelope));
    }

    /// Delivers every message whose arrival time has passed. Jitter can
    /// reorder deliveries; the receiving buffer is expected to cope.
    pub fn pump(&mut self, now_ms: u64) {
        let mut due: Vec<(u64, Envelope)> = Vec::new();
        self.in_flight.retain(|(at, envelope)| {
            if *at <= now_ms {
                due.push((*at, envelope.clone()));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(at, _)| *at);
        for (at, envelope) in due {
            self.inbox.deliver_at(envelope, at);
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport;
    use protocol::{Body, PingData};

    fn ping(timestamp: u64) -> Envelope {
        Envelope::new(Body::Ping(PingData { timestamp }), timestamp)
    }

    #[test]
    fn test_simulated_transport_records_sends() {
        let transport = SimulatedTransport::new();
        assert!(transport.send(&ping(1)));
        assert!(transport.send(&ping(2)));
        assert_eq!(transport.sent_count(), 2);

        transport.set_ready(false);
        assert!(!transport.send(&ping(3)));
        assert_eq!(transport.take_sent().len(), 2);
        assert_eq!(transport.sent_count(), 0);
    }

    #[test]
    fn test_jittered_link_delivers_after_delay() {
        let (sender, mut inbox) = transport::inbox();
        let mut link = JitteredLink::new(sender, 50, 0, 7);

        link.submit(ping(1), 1000);
        link.pump(1040);
        assert!(inbox.drain().is_empty());
        assert_eq!(link.in_flight_count(), 1);

        link.pump(1050);
        let arrived = inbox.drain();
        assert_eq!(arrived.len(), 1);
        assert_eq!(arrived[0].received_at, 1050);
        assert_eq!(link.in_flight_count(), 0);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let (sender, mut inbox) = transport::inbox();
        let mut link = JitteredLink::new(sender, 20, 30, 42);

        for i in 0..100 {
            link.submit(ping(i), 0);
        }
        link.pump(1000);

        for message in inbox.drain() {
            assert!(message.received_at >= 20);
            assert!(message.received_at <= 50);
        }
    }
}
