//! # Arena Client Sync Core
//!
//! Real-time state synchronization for a client in a fast-paced multiplayer
//! arena session against an authoritative server. Every peer runs its own
//! local simulation; this library makes each peer's screen show a consistent,
//! smooth approximation of every other peer's avatar despite latency, packet
//! timing jitter, and silent server corrections of the client's own position.
//!
//! ## Architecture Overview
//!
//! The core hides network imperfection behind four cooperating mechanisms:
//!
//! ### State Transmission
//! The local player's state is sampled once per tick and put on the wire at a
//! fixed interval. Only the freshest continuous sample per tick survives;
//! discrete actions (attacks) bypass the rate limiter and go out immediately.
//!
//! ### Snapshot Buffering & Interpolation
//! Remote entity states arrive as timestamped snapshots into a bounded,
//! time-ordered buffer per entity. Rendering runs slightly behind real time
//! so two snapshots usually bracket the render instant, and the position is
//! blended between them. The delay adapts to measured round-trip time.
//!
//! ### Extrapolation
//! When a peer's buffer goes stale, its position is dead-reckoned forward
//! from the last known velocity, capped so a silent peer stops instead of
//! flying off. When real data returns, the accumulated error is blended out
//! rather than snapped.
//!
//! ### Reconciliation
//! The server periodically echoes its authoritative view of the local player.
//! Small divergence is trusted; divergence past a threshold snaps the local
//! position to the server value, hard and immediately, preferring a rare
//! visible pop over unbounded drift.
//!
//! ## Concurrency Model
//!
//! A single logical thread drives the whole core through
//! [`sync::SyncLoop::tick`], called once per simulation frame with the
//! current time. Network arrivals land in a pending inbox from whatever task
//! the transport runs on and are applied only at the start of the next tick,
//! so the tick loop is the sole mutator of per-entity state and nothing ever
//! blocks or locks. The core never reads the wall clock itself, which keeps
//! every timing decision replayable in tests.
//!
//! ## Collaborators
//!
//! Gameplay (entity registry), transport, rendering, and HUD are injected
//! seams; see [`registry`] and [`transport`]. The core publishes a render
//! position per remote entity per tick and a drained stream of
//! [`registry::SyncEvent`]s; it owns no gameplay rules of its own.

pub mod config;
pub mod interpolation;
pub mod latency;
pub mod reconcile;
pub mod registry;
pub mod simulator;
pub mod snapshot;
pub mod sync;
pub mod transmitter;
pub mod transport;
pub mod utils;
