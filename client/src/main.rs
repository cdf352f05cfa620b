//! Loopback demo: drives the sync core against a simulated server over a
//! jittered link, logging reconciliation snaps and session stats.

use clap::Parser;
use client::config::SyncConfig;
use client::registry::{EntityRegistry, LocalEntityState, RenderState, SyncEvent};
use client::simulator::{JitteredLink, SimulatedTransport};
use client::snapshot::EntityId;
use client::sync::SyncLoop;
use client::utils::{now_millis, round_wire};
use log::info;
use protocol::{Body, Envelope, GameStateSyncData, PlayerEntry, PongData};
use std::time::Duration;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// How long to run the loopback session, in seconds
    #[arg(short = 'd', long, default_value = "5")]
    duration: u64,

    /// Simulation tick interval in milliseconds
    #[arg(short = 't', long, default_value = "16")]
    tick_ms: u64,

    /// Simulated one-way latency in milliseconds
    #[arg(short = 'l', long, default_value = "60")]
    latency: u64,

    /// Random delivery jitter in milliseconds
    #[arg(short = 'j', long, default_value = "20")]
    jitter: u64,
}

/// Scripted gameplay stand-in: a local player pacing the arena and one
/// remote ghost whose render state we record.
struct DemoRegistry {
    local: LocalEntityState,
    ghost_render: Option<RenderState>,
}

impl DemoRegistry {
    fn new() -> Self {
        Self {
            local: LocalEntityState {
                x: 100.0,
                y: 300.0,
                vx: 120.0,
                vy: 0.0,
                animation: "run".to_string(),
                facing_right: true,
            },
            ghost_render: None,
        }
    }

    /// Advances the local player one tick, bouncing off the arena edges.
    fn step(&mut self, dt_ms: u64) {
        let dt = dt_ms as f32 / 1000.0;
        self.local.x += self.local.vx * dt;
        if self.local.x < 0.0 || self.local.x > 800.0 {
            self.local.vx = -self.local.vx;
            self.local.facing_right = self.local.vx > 0.0;
            self.local.x = self.local.x.clamp(0.0, 800.0);
        }
    }
}

impl EntityRegistry for DemoRegistry {
    fn local_entity_id(&self) -> Option<EntityId> {
        Some(EntityId::from("local"))
    }

    fn remote_entity_ids(&self) -> Vec<EntityId> {
        vec![EntityId::from("ghost")]
    }

    fn sample_local(&self) -> Option<LocalEntityState> {
        Some(self.local.clone())
    }

    fn apply_local_position(&mut self, x: f32, y: f32) {
        self.local.x = x;
        self.local.y = y;
    }

    fn publish_render(&mut self, _entity_id: &EntityId, state: RenderState) {
        self.ghost_render = Some(state);
    }
}

fn ghost_entry(elapsed_ms: u64) -> PlayerEntry {
    // ghost paces a 600px corridor at 80 px/s
    let t = elapsed_ms as f32 / 1000.0;
    let span = 600.0;
    let phase = (t * 80.0) % (2.0 * span);
    let (x, vx) = if phase < span {
        (100.0 + phase, 80.0)
    } else {
        (100.0 + 2.0 * span - phase, -80.0)
    };
    PlayerEntry {
        player_id: "ghost".to_string(),
        x: Some(round_wire(x)),
        y: Some(300.0),
        vx: Some(vx),
        vy: Some(0.0),
        animation: Some("run".to_string()),
        facing_right: Some(vx > 0.0),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting loopback sync demo...");
    info!(
        "Link: {}ms one-way latency, {}ms jitter",
        args.latency, args.jitter
    );

    let (mut sync, inbox) = SyncLoop::new(
        SyncConfig::default(),
        SimulatedTransport::new(),
        DemoRegistry::new(),
    );
    sync.add_remote_entity(EntityId::from("ghost"));
    let mut link = JitteredLink::new(inbox, args.latency, args.jitter, 67);

    let start = now_millis();
    let duration_ms = args.duration * 1000;
    let mut ticker = interval(Duration::from_millis(args.tick_ms));
    let mut last_broadcast = 0u64;
    let mut last_local_state = None;
    let mut drift_injected = false;

    loop {
        ticker.tick().await;
        let now = now_millis();
        let elapsed = now - start;
        if elapsed >= duration_ms {
            break;
        }

        sync.registry_mut().step(args.tick_ms);

        // the "server" half of the loopback: answer pings, remember the
        // latest reported local state
        for envelope in sync.transport().take_sent() {
            match envelope.body {
                Body::Ping(ping) => link.submit(
                    Envelope::new(
                        Body::Pong(PongData {
                            timestamp: ping.timestamp,
                        }),
                        now,
                    ),
                    now,
                ),
                Body::PlayerState(state) => last_local_state = Some(state),
                _ => {}
            }
        }

        // authoritative broadcast at 20Hz, echoing the local player back;
        // halfway through the session the echo is shifted once to force a
        // visible reconciliation snap
        if now.saturating_sub(last_broadcast) >= 50 {
            let mut players = vec![ghost_entry(elapsed)];
            if let Some(state) = &last_local_state {
                let mut x = state.x;
                if !drift_injected && elapsed >= duration_ms / 2 {
                    x += 120.0;
                    drift_injected = true;
                    info!("injecting 120px of authoritative drift");
                }
                players.push(PlayerEntry {
                    player_id: "local".to_string(),
                    x: Some(x),
                    y: Some(state.y),
                    vx: Some(state.vx),
                    vy: Some(state.vy),
                    animation: Some(state.animation.clone()),
                    facing_right: Some(state.facing_right),
                });
            }
            link.submit(
                Envelope::new(Body::GameStateSync(GameStateSyncData { players }), now),
                now,
            );
            last_broadcast = now;
        }

        link.pump(now);
        sync.tick(now);

        for event in sync.drain_events() {
            match event {
                SyncEvent::LocalSnap { error, .. } => {
                    info!("local position snapped ({:.1}px of drift)", error)
                }
                SyncEvent::UnknownEntity { entity_id } => {
                    info!("snapshot for unknown entity {}", entity_id)
                }
                _ => {}
            }
        }
    }

    let stats = sync.stats();
    info!(
        "Session over: rtt={}ms delay={}ms states_sent={} snaps={}",
        stats.latency_ms, stats.interpolation_delay_ms, stats.states_sent, stats.snaps
    );
    if let Some(render) = &sync.registry().ghost_render {
        info!("ghost last rendered at ({:.1}, {:.1})", render.x, render.y);
    }

    Ok(())
}
