//! The per-tick driver that orders ingestion, transmission, reconciliation,
//! and render advancement.
//!
//! One `tick` runs the fixed sequence: (1) drain the pending inbox and apply
//! every arrival, (2) transmit the local state if due, (3) reconcile against
//! a fresh authoritative view of the local player, (4) advance every remote
//! entity and publish its render state, (5) advance the latency probe. A
//! snapshot that arrived since the previous tick is therefore visible in this
//! tick's render pass, never a frame late.

use crate::config::SyncConfig;
use crate::interpolation::RemoteEntityChannel;
use crate::latency::LatencyProbe;
use crate::reconcile::{Reconciler, Reconciliation};
use crate::registry::{EntityRegistry, SyncEvent};
use crate::snapshot::{EntityId, Snapshot};
use crate::transmitter::StateTransmitter;
use crate::transport::{Inbox, InboxSender, Transport};
use log::{info, warn};
use protocol::{Body, GameStateSyncData, PlayerEntry, RespawnData};
use std::collections::HashMap;

/// Point-in-time view of the core's health, for HUD/metrics display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncStats {
    pub latency_ms: u64,
    pub interpolation_delay_ms: u64,
    pub remote_channels: usize,
    pub states_sent: u64,
    pub events_sent: u64,
    pub snaps: u64,
}

/// Orchestrates the synchronization core over injected collaborators.
///
/// The caller supplies `now_ms` on every tick; the loop itself never consults
/// the wall clock, which keeps every timing decision replayable in tests.
pub struct SyncLoop<T: Transport, R: EntityRegistry> {
    config: SyncConfig,
    transport: T,
    registry: R,
    inbox: Inbox,
    transmitter: StateTransmitter,
    reconciler: Reconciler,
    probe: LatencyProbe,
    channels: HashMap<EntityId, RemoteEntityChannel>,
    pending_local: Option<PlayerEntry>,
    pending_forced: Option<(f32, f32)>,
    events: Vec<SyncEvent>,
    snaps: u64,
}

impl<T: Transport, R: EntityRegistry> SyncLoop<T, R> {
    /// Builds the loop and hands back the inbox sender the transport's
    /// receive callback delivers into.
    pub fn new(config: SyncConfig, transport: T, registry: R) -> (Self, InboxSender) {
        let (sender, inbox) = crate::transport::inbox();
        let transmitter = StateTransmitter::new(config.send_interval_ms);
        let reconciler = Reconciler::new(config.reconcile_threshold);
        let probe = LatencyProbe::new(
            config.ping_interval_ms,
            config.interpolation_delay_ms,
            config.max_interpolation_delay_ms,
        );
        (
            Self {
                config,
                transport,
                registry,
                inbox,
                transmitter,
                reconciler,
                probe,
                channels: HashMap::new(),
                pending_local: None,
                pending_forced: None,
                events: Vec::new(),
                snaps: 0,
            },
            sender,
        )
    }

    /// Registers a remote entity joining the session.
    pub fn add_remote_entity(&mut self, entity_id: EntityId) {
        let capacity = self.config.snapshot_capacity;
        self.channels
            .entry(entity_id)
            .or_insert_with(|| RemoteEntityChannel::new(capacity));
    }

    /// Tears down a departing remote entity's state. Snapshots still in
    /// flight for it will surface as `UnknownEntity` from now on.
    pub fn remove_remote_entity(&mut self, entity_id: &EntityId) {
        if self.channels.remove(entity_id).is_some() {
            info!("removed remote entity {}", entity_id);
        }
    }

    /// Sends a discrete action (attack etc.) immediately, bypassing the
    /// continuous-state rate limiter.
    pub fn send_action(&mut self, body: Body, now_ms: u64) {
        self.transmitter.send_event(body, now_ms, &self.transport);
    }

    /// Runs one simulation tick. `now_ms` is the receiver's clock.
    pub fn tick(&mut self, now_ms: u64) {
        // (1) apply everything that arrived since the previous tick
        self.drain_inbox(now_ms);

        // (2) put the freshest local sample on the wire if due
        let local_sample = self.registry.sample_local();
        if let Some(local) = &local_sample {
            self.transmitter
                .sample_and_maybe_send(local, now_ms, &self.transport);
        }

        // (3) reconcile the local player against fresh authority
        if let Some(local) = &local_sample {
            if let Some((x, y)) = self.pending_forced.take() {
                // a forced correction outranks this tick's regular sync entry
                self.pending_local = None;
                let outcome = self
                    .reconciler
                    .apply_forced_correction(x, y, local.x, local.y);
                self.apply_reconciliation(outcome);
            } else if let Some(entry) = self.pending_local.take() {
                let outcome = self.reconciler.reconcile(&entry, local.x, local.y);
                self.apply_reconciliation(outcome);
            }
        }

        // (4) advance every remote entity and publish its render state
        let delay_ms = self.probe.interpolation_delay_ms();
        for entity_id in self.registry.remote_entity_ids() {
            if let Some(channel) = self.channels.get_mut(&entity_id) {
                if let Some(state) = channel.advance(now_ms, delay_ms, &self.config) {
                    self.registry.publish_render(&entity_id, state);
                }
            }
        }

        // (5) advance the latency probe
        self.probe.advance(now_ms, &self.transport);
    }

    fn apply_reconciliation(&mut self, outcome: Reconciliation) {
        if let Reconciliation::Snapped { error, x, y } = outcome {
            self.registry.apply_local_position(x, y);
            self.events.push(SyncEvent::LocalSnap { error, x, y });
            self.snaps += 1;
        }
    }

    fn drain_inbox(&mut self, now_ms: u64) {
        for message in self.inbox.drain() {
            let sender_timestamp = message.envelope.timestamp;
            let received_at = message.received_at;
            match message.envelope.body {
                Body::GameStateSync(sync) => {
                    self.apply_game_state_sync(sync, sender_timestamp, received_at)
                }
                Body::Pong(pong) => self.probe.on_pong(pong.timestamp, now_ms),
                Body::PositionCorrection(correction) => {
                    self.pending_forced = Some((correction.x, correction.y));
                }
                Body::PlayerAttack(attack) => self.events.push(SyncEvent::Attack(attack)),
                Body::PlayerHit(hit) => self.events.push(SyncEvent::Hit(hit)),
                Body::PlayerDeath(death) => self.events.push(SyncEvent::Death(death)),
                Body::PlayerRespawn(respawn) => self.handle_respawn(respawn),
                Body::PlayerState(_) | Body::Ping(_) => {
                    warn!("ignoring client-bound message of a client-to-server type");
                }
            }
        }
    }

    fn apply_game_state_sync(
        &mut self,
        sync: GameStateSyncData,
        sender_timestamp: u64,
        received_at: u64,
    ) {
        let local_id = self.registry.local_entity_id();
        for entry in sync.players {
            let entity_id = EntityId(entry.player_id.clone());
            if Some(&entity_id) == local_id.as_ref() {
                // latest authoritative view wins; reconciled at step (3)
                self.pending_local = Some(entry);
            } else if let Some(channel) = self.channels.get_mut(&entity_id) {
                match Snapshot::from_entry(&entry, sender_timestamp, received_at) {
                    Ok(snapshot) => {
                        channel.ingest(snapshot);
                    }
                    Err(err) => warn!("dropping snapshot: {}", err),
                }
            } else {
                // never materialize entities here; the lifecycle collaborator
                // may have missed a join and needs to know
                self.events.push(SyncEvent::UnknownEntity { entity_id });
            }
        }
    }

    fn handle_respawn(&mut self, respawn: RespawnData) {
        let is_local = self
            .registry
            .local_entity_id()
            .map(|id| id.0 == respawn.player_id)
            .unwrap_or(false);
        if is_local {
            self.reconciler.reset(respawn.x, respawn.y);
        }
        self.events.push(SyncEvent::Respawn(respawn));
    }

    /// Drains the events produced since the last call. Intended to be called
    /// once per tick by the HUD/lifecycle collaborators.
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            latency_ms: self.probe.latency_ms(),
            interpolation_delay_ms: self.probe.interpolation_delay_ms(),
            remote_channels: self.channels.len(),
            states_sent: self.transmitter.states_sent(),
            events_sent: self.transmitter.events_sent(),
            snaps: self.snaps,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    pub fn channel(&self, entity_id: &EntityId) -> Option<&RemoteEntityChannel> {
        self.channels.get(entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{LocalEntityState, RenderState};
    use crate::simulator::SimulatedTransport;
    use protocol::{Envelope, PongData, PositionCorrectionData};

    /// Minimal gameplay stand-in: one local player plus render recording.
    struct TestRegistry {
        local_id: Option<EntityId>,
        local: Option<LocalEntityState>,
        remotes: Vec<EntityId>,
        published: HashMap<EntityId, RenderState>,
        corrections: Vec<(f32, f32)>,
    }

    impl TestRegistry {
        fn new() -> Self {
            Self {
                local_id: Some(EntityId::from("local")),
                local: Some(LocalEntityState {
                    x: 100.0,
                    y: 100.0,
                    vx: 0.0,
                    vy: 0.0,
                    animation: "idle".to_string(),
                    facing_right: true,
                }),
                remotes: vec![EntityId::from("remote")],
                published: HashMap::new(),
                corrections: Vec::new(),
            }
        }
    }

    impl EntityRegistry for TestRegistry {
        fn local_entity_id(&self) -> Option<EntityId> {
            self.local_id.clone()
        }

        fn remote_entity_ids(&self) -> Vec<EntityId> {
            self.remotes.clone()
        }

        fn sample_local(&self) -> Option<LocalEntityState> {
            self.local.clone()
        }

        fn apply_local_position(&mut self, x: f32, y: f32) {
            self.corrections.push((x, y));
            if let Some(local) = &mut self.local {
                local.x = x;
                local.y = y;
            }
        }

        fn publish_render(&mut self, entity_id: &EntityId, state: RenderState) {
            self.published.insert(entity_id.clone(), state);
        }
    }

    fn entry(id: &str, x: f32, y: f32) -> PlayerEntry {
        PlayerEntry {
            player_id: id.to_string(),
            x: Some(x),
            y: Some(y),
            vx: Some(0.0),
            vy: Some(0.0),
            animation: Some("run".to_string()),
            facing_right: Some(true),
        }
    }

    fn sync_envelope(timestamp: u64, players: Vec<PlayerEntry>) -> Envelope {
        Envelope::new(Body::GameStateSync(GameStateSyncData { players }), timestamp)
    }

    fn new_loop() -> (
        SyncLoop<SimulatedTransport, TestRegistry>,
        crate::transport::InboxSender,
    ) {
        let (mut sync, sender) = SyncLoop::new(
            SyncConfig::default(),
            SimulatedTransport::new(),
            TestRegistry::new(),
        );
        sync.add_remote_entity(EntityId::from("remote"));
        (sync, sender)
    }

    #[test]
    fn test_snapshot_ingested_and_rendered_same_tick() {
        let (mut sync, sender) = new_loop();

        sender.deliver_at(sync_envelope(1000, vec![entry("remote", 42.0, 7.0)]), 1000);
        sync.tick(1000);

        let published = &sync.registry().published;
        let state = published.get(&EntityId::from("remote")).unwrap();
        assert_eq!(state.x, 42.0);
        assert_eq!(state.y, 7.0);
    }

    #[test]
    fn test_unknown_entity_signalled_not_created() {
        let (mut sync, sender) = new_loop();

        sender.deliver_at(sync_envelope(1000, vec![entry("ghost", 1.0, 2.0)]), 1000);
        sync.tick(1000);

        assert!(sync.channel(&EntityId::from("ghost")).is_none());
        let events = sync.drain_events();
        assert!(matches!(
            events.as_slice(),
            [SyncEvent::UnknownEntity { entity_id }] if entity_id.0 == "ghost"
        ));
    }

    #[test]
    fn test_removed_entity_resurfaces_as_unknown() {
        let (mut sync, sender) = new_loop();

        sender.deliver_at(sync_envelope(1000, vec![entry("remote", 1.0, 2.0)]), 1000);
        sync.tick(1000);
        assert!(sync.drain_events().is_empty());

        sync.remove_remote_entity(&EntityId::from("remote"));
        sender.deliver_at(sync_envelope(1100, vec![entry("remote", 3.0, 4.0)]), 1100);
        sync.tick(1100);

        let events = sync.drain_events();
        assert!(matches!(
            events.as_slice(),
            [SyncEvent::UnknownEntity { entity_id }] if entity_id.0 == "remote"
        ));
    }

    #[test]
    fn test_local_entry_reconciles_with_snap() {
        let (mut sync, sender) = new_loop();

        // local predicted at (100,100); server says (300,100): error 200 > 50
        sender.deliver_at(sync_envelope(1000, vec![entry("local", 300.0, 100.0)]), 1000);
        sync.tick(1000);

        assert_eq!(sync.registry().corrections, vec![(300.0, 100.0)]);
        let events = sync.drain_events();
        assert!(matches!(
            events.as_slice(),
            [SyncEvent::LocalSnap { error, .. }] if (*error - 200.0).abs() < 0.001
        ));
        assert_eq!(sync.stats().snaps, 1);
    }

    #[test]
    fn test_local_entry_within_threshold_is_trusted() {
        let (mut sync, sender) = new_loop();

        sender.deliver_at(sync_envelope(1000, vec![entry("local", 120.0, 100.0)]), 1000);
        sync.tick(1000);

        assert!(sync.registry().corrections.is_empty());
        assert!(sync.drain_events().is_empty());
    }

    #[test]
    fn test_forced_correction_outranks_sync_entry() {
        let (mut sync, sender) = new_loop();

        sender.deliver_at(sync_envelope(1000, vec![entry("local", 101.0, 100.0)]), 1000);
        sender.deliver_at(
            Envelope::new(
                Body::PositionCorrection(PositionCorrectionData {
                    x: 5.0,
                    y: 6.0,
                    vx: 0.0,
                    vy: 0.0,
                }),
                1001,
            ),
            1001,
        );
        sync.tick(1002);

        assert_eq!(sync.registry().corrections, vec![(5.0, 6.0)]);
    }

    #[test]
    fn test_pong_raises_interpolation_delay() {
        let (mut sync, sender) = new_loop();

        sync.tick(1000); // fires the first ping
        assert!(sync
            .transport()
            .take_sent()
            .iter()
            .any(|e| matches!(e.body, Body::Ping(_))));

        sender.deliver_at(Envelope::new(Body::Pong(PongData { timestamp: 1000 }), 1150), 1200);
        sync.tick(1200);

        assert_eq!(sync.stats().latency_ms, 200);
        assert_eq!(sync.stats().interpolation_delay_ms, 300);
    }

    #[test]
    fn test_malformed_remote_entry_dropped() {
        let (mut sync, sender) = new_loop();

        let mut bad = entry("remote", 1.0, 2.0);
        bad.vx = None;
        sender.deliver_at(sync_envelope(1000, vec![bad]), 1000);
        sync.tick(1000);

        assert!(sync
            .channel(&EntityId::from("remote"))
            .unwrap()
            .buffer()
            .is_empty());
        assert!(sync.registry().published.is_empty());
    }

    #[test]
    fn test_respawn_resets_local_prediction() {
        let (mut sync, sender) = new_loop();

        sender.deliver_at(
            Envelope::new(
                Body::PlayerRespawn(RespawnData {
                    player_id: "local".to_string(),
                    x: 400.0,
                    y: 50.0,
                    health: 100,
                }),
                1000,
            ),
            1000,
        );
        sync.tick(1000);

        let events = sync.drain_events();
        assert!(matches!(events.as_slice(), [SyncEvent::Respawn(_)]));
    }

    #[test]
    fn test_combat_messages_pass_through_as_events() {
        let (mut sync, sender) = new_loop();

        sender.deliver_at(
            Envelope::new(
                Body::PlayerHit(protocol::HitData {
                    attacker_id: "remote".to_string(),
                    victim_id: "local".to_string(),
                    damage: 25,
                    health: 75,
                    attack_type: "melee".to_string(),
                }),
                1000,
            ),
            1000,
        );
        sender.deliver_at(
            Envelope::new(
                Body::PlayerDeath(protocol::DeathData {
                    victim_id: "local".to_string(),
                    killer_id: "remote".to_string(),
                }),
                1001,
            ),
            1001,
        );
        sync.tick(1002);

        let events = sync.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], SyncEvent::Hit(hit) if hit.health == 75));
        assert!(matches!(&events[1], SyncEvent::Death(death) if death.victim_id == "local"));
        // gameplay effects stay external; the core applied nothing itself
        assert!(sync.registry().corrections.is_empty());
    }

    #[test]
    fn test_action_sent_immediately_alongside_rate_limited_state() {
        let (mut sync, _sender) = new_loop();

        sync.tick(1000);
        sync.transport().take_sent();

        // inside the send interval: continuous state is withheld, the
        // discrete action is not
        sync.send_action(
            Body::PlayerAttack(protocol::AttackData {
                attacker_id: None,
                attack_type: "arrow".to_string(),
                x: 100.0,
                y: 100.0,
                direction: "right".to_string(),
                facing_right: true,
                timestamp: 1004,
            }),
            1004,
        );
        sync.tick(1004);

        let sent = sync.transport().take_sent();
        assert!(sent.iter().any(|e| matches!(e.body, Body::PlayerAttack(_))));
        assert!(!sent.iter().any(|e| matches!(e.body, Body::PlayerState(_))));
    }

    #[test]
    fn test_out_of_order_delivery_reordered_in_buffer() {
        let (mut sync, sender) = new_loop();

        for timestamp in [200u64, 100, 150] {
            sender.deliver_at(
                sync_envelope(timestamp, vec![entry("remote", timestamp as f32, 0.0)]),
                1000,
            );
        }
        sync.tick(1000);

        let channel = sync.channel(&EntityId::from("remote")).unwrap();
        let timestamps: Vec<u64> = channel
            .buffer()
            .iter()
            .map(|s| s.sender_timestamp)
            .collect();
        assert_eq!(timestamps, vec![100, 150, 200]);
    }
}
