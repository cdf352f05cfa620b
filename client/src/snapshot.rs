//! Timestamped entity state snapshots and the per-entity receive buffer.

use protocol::PlayerEntry;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// Server-assigned identifier for a networked entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub String);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}

/// Why an inbound state entry was not turned into a usable snapshot.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed state entry for {entity}: {reason}")]
    Malformed {
        entity: String,
        reason: &'static str,
    },
}

/// One entity's observable state at a single instant, as received off the wire.
///
/// `sender_timestamp` is the originating clock and is only ever compared
/// against other timestamps from the same entity. `received_at` is stamped
/// with the receiving client's clock on arrival; the two clock domains are
/// never mixed.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub entity_id: EntityId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub animation: String,
    pub facing_right: bool,
    pub sender_timestamp: u64,
    pub received_at: u64,
}

impl Snapshot {
    /// Builds a snapshot from a wire entry, stamping the local receipt time.
    ///
    /// Entries with missing or non-finite kinematics are rejected so a
    /// malformed message never reaches the buffer.
    pub fn from_entry(
        entry: &PlayerEntry,
        sender_timestamp: u64,
        received_at: u64,
    ) -> Result<Self, IngestError> {
        let malformed = |reason| IngestError::Malformed {
            entity: entry.player_id.clone(),
            reason,
        };

        let (x, y) = match (entry.x, entry.y) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(malformed("missing position")),
        };
        let (vx, vy) = match (entry.vx, entry.vy) {
            (Some(vx), Some(vy)) => (vx, vy),
            _ => return Err(malformed("missing velocity")),
        };
        if !x.is_finite() || !y.is_finite() || !vx.is_finite() || !vy.is_finite() {
            return Err(malformed("non-finite kinematics"));
        }

        Ok(Self {
            entity_id: EntityId(entry.player_id.clone()),
            x,
            y,
            vx,
            vy,
            animation: entry.animation.clone().unwrap_or_else(|| "idle".to_string()),
            facing_right: entry.facing_right.unwrap_or(true),
            sender_timestamp,
            received_at,
        })
    }
}

/// Bounded, time-ordered history of snapshots for one remote entity.
///
/// Invariant: when non-empty, entries are sorted ascending by
/// `sender_timestamp` with no duplicate timestamps.
#[derive(Debug)]
pub struct SnapshotBuffer {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Inserts a snapshot, keeping the buffer sorted and bounded.
    ///
    /// Out-of-order deliveries are re-sorted into place. A snapshot older
    /// than the oldest entry of a *full* buffer is dropped as stale: it would
    /// be the immediate eviction victim anyway. An entry with an equal
    /// `sender_timestamp` is replaced only by a fresher transport delivery
    /// (`received_at`). At capacity, insertion evicts the single oldest
    /// entry. Returns whether the buffer changed.
    pub fn ingest(&mut self, snapshot: Snapshot) -> bool {
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.entries.front() {
                if snapshot.sender_timestamp < oldest.sender_timestamp {
                    return false;
                }
            }
        }

        if let Some(pos) = self
            .entries
            .iter()
            .position(|s| s.sender_timestamp == snapshot.sender_timestamp)
        {
            // duplicate timestamp: keep the most recently received delivery
            if snapshot.received_at >= self.entries[pos].received_at {
                self.entries[pos] = snapshot;
                return true;
            }
            return false;
        }

        let pos = self
            .entries
            .iter()
            .position(|s| s.sender_timestamp > snapshot.sender_timestamp)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, snapshot);

        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest(&self) -> Option<&Snapshot> {
        self.entries.front()
    }

    pub fn newest(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The two snapshots bracketing `render_time`: the last one at or before
    /// it, and the first one after it.
    pub fn bracket(&self, render_time: u64) -> (Option<&Snapshot>, Option<&Snapshot>) {
        let before = self
            .entries
            .iter()
            .rev()
            .find(|s| s.sender_timestamp <= render_time);
        let after = self
            .entries
            .iter()
            .find(|s| s.sender_timestamp > render_time);
        (before, after)
    }
}
