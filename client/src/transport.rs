//! Transport seam and the tick-drained pending inbox.
//!
//! The sync core never touches a socket. Outbound traffic goes through the
//! [`Transport`] trait; inbound messages are delivered by the transport's
//! receive callback into an [`InboxSender`] and applied only when the tick
//! loop drains the [`Inbox`] at the start of the next tick. Single producer,
//! single consumer: the tick loop stays the sole mutator of per-entity state.

use crate::utils::now_millis;
use protocol::Envelope;
use tokio::sync::mpsc;

/// Outbound message sink provided by the transport collaborator.
pub trait Transport {
    /// Whether the link can currently carry messages.
    fn is_ready(&self) -> bool;

    /// Fire-and-forget send. Returns false if the message did not go out;
    /// callers skip and retry with fresher state rather than queueing.
    fn send(&self, envelope: &Envelope) -> bool;
}

/// An inbound message stamped with the receiver's clock at arrival.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub envelope: Envelope,
    pub received_at: u64,
}

/// Producer half, handed to the transport's receive callback.
#[derive(Debug, Clone)]
pub struct InboxSender {
    tx: mpsc::UnboundedSender<InboundMessage>,
}

impl InboxSender {
    /// Stamps the local receipt time and enqueues for the next tick.
    pub fn deliver(&self, envelope: Envelope) {
        self.deliver_at(envelope, now_millis());
    }

    /// Enqueues with an explicit receipt timestamp (simulated links, tests).
    pub fn deliver_at(&self, envelope: Envelope, received_at: u64) {
        // a dropped receiver means the session is gone; nothing to do
        let _ = self.tx.send(InboundMessage {
            envelope,
            received_at,
        });
    }
}

/// Consumer half, owned by the tick loop.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl Inbox {
    /// Drains everything that arrived since the previous tick.
    pub fn drain(&mut self) -> Vec<InboundMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

/// Creates a connected sender/inbox pair.
pub fn inbox() -> (InboxSender, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InboxSender { tx }, Inbox { rx })
}
