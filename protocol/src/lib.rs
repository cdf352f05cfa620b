//! Wire protocol shared between the arena client and the authoritative server.
//!
//! Every message travels as a field-named JSON object of the shape
//! `{"type": ..., "data": ..., "timestamp": ...}`, with camelCase payload
//! fields. The `timestamp` is always the *sender's* clock; the two ends never
//! assume their clocks agree.

use serde::{Deserialize, Serialize};

/// Continuous-state send interval (~render tick rate).
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 16;
/// Baseline render delay behind real time for remote entities.
pub const DEFAULT_INTERPOLATION_DELAY_MS: u64 = 100;
/// Ceiling for the adaptive interpolation delay under high RTT.
pub const MAX_INTERPOLATION_DELAY_MS: u64 = 300;
/// Buffer staleness beyond which rendering switches to dead reckoning.
pub const EXTRAPOLATION_THRESHOLD_MS: u64 = 100;
/// Cap on dead-reckoning projection so a silent peer stops moving.
pub const MAX_EXTRAPOLATION_MS: u64 = 300;
/// Local prediction error (px) beyond which the server position is snapped.
pub const RECONCILE_SNAP_THRESHOLD: f32 = 50.0;
/// Latency probe cadence.
pub const PING_INTERVAL_MS: u64 = 1000;
/// Snapshots retained per remote entity; oldest evicted on overflow.
pub const SNAPSHOT_BUFFER_CAPACITY: usize = 10;
/// Fraction of residual extrapolation error corrected per tick.
pub const CORRECTION_RATE: f32 = 0.3;
/// Residual error (px) below which correction stops blending.
pub const CORRECTION_EPSILON: f32 = 5.0;
/// Interpolation delay is raised to `RTT * this` once RTT exceeds the floor.
pub const RTT_DELAY_FACTOR: f32 = 1.5;

/// A complete wire message: tagged body plus the sender's clock.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Envelope {
    #[serde(flatten)]
    pub body: Body,
    pub timestamp: u64,
}

impl Envelope {
    pub fn new(body: Body, timestamp: u64) -> Self {
        Self { body, timestamp }
    }
}

/// Message bodies, tagged on the wire as `type` with payload under `data`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Body {
    PlayerState(PlayerStateData),
    Ping(PingData),
    Pong(PongData),
    GameStateSync(GameStateSyncData),
    PlayerAttack(AttackData),
    PlayerHit(HitData),
    PlayerDeath(DeathData),
    PlayerRespawn(RespawnData),
    PositionCorrection(PositionCorrectionData),
}

/// Local player state, client to server, rate-limited and coalesced.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateData {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub animation: String,
    pub facing_right: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PingData {
    pub timestamp: u64,
}

/// Echo of a ping, carrying the original client timestamp back.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PongData {
    pub timestamp: u64,
}

/// One player's state inside a `game_state_sync` broadcast.
///
/// Kinematic and presentation fields are optional on the wire so a partial
/// or malformed entry can be represented and skipped instead of failing the
/// whole message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub player_id: String,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub vx: Option<f32>,
    #[serde(default)]
    pub vy: Option<f32>,
    #[serde(default)]
    pub animation: Option<String>,
    #[serde(default)]
    pub facing_right: Option<bool>,
}

/// Authoritative server view of every player in the session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GameStateSyncData {
    pub players: Vec<PlayerEntry>,
}

/// Discrete attack action. Client to server it is sent immediately, never
/// coalesced; the server broadcasts it back with `attacker_id` filled in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttackData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attacker_id: Option<String>,
    pub attack_type: String,
    pub x: f32,
    pub y: f32,
    pub direction: String,
    pub facing_right: bool,
    pub timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HitData {
    pub attacker_id: String,
    pub victim_id: String,
    pub damage: i32,
    pub health: i32,
    pub attack_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeathData {
    pub victim_id: String,
    pub killer_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RespawnData {
    pub player_id: String,
    pub x: f32,
    pub y: f32,
    pub health: i32,
}

/// Server-issued forced correction of the local player's kinematics, sent
/// when the server rejects a reported state. Always applied as a snap.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PositionCorrectionData {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = Envelope::new(Body::Ping(PingData { timestamp: 123 }), 123);
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], "ping");
        assert_eq!(value["timestamp"], 123);
        assert_eq!(value["data"]["timestamp"], 123);
    }

    #[test]
    fn test_player_state_field_names() {
        let envelope = Envelope::new(
            Body::PlayerState(PlayerStateData {
                x: 10.5,
                y: 20.25,
                vx: -1.0,
                vy: 0.0,
                animation: "run".to_string(),
                facing_right: false,
            }),
            999,
        );
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], "player_state");
        let data = &value["data"];
        assert_eq!(data["x"], 10.5);
        assert_eq!(data["vx"], -1.0);
        assert_eq!(data["animation"], "run");
        assert_eq!(data["facingRight"], false);
        // camelCase only; the snake_case spelling must not leak onto the wire
        assert!(data.get("facing_right").is_none());
    }

    #[test]
    fn test_game_state_sync_from_server_json() {
        let raw = r#"{
            "type": "game_state_sync",
            "data": {
                "players": [
                    {"playerId": "p1", "x": 1.0, "y": 2.0, "vx": 3.0, "vy": 4.0,
                     "animation": "idle", "facingRight": true},
                    {"playerId": "p2", "x": 5.0, "y": 6.0, "vx": 0.0, "vy": 0.0,
                     "animation": "run", "facingRight": false}
                ]
            },
            "timestamp": 1700000000000
        }"#;

        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.timestamp, 1_700_000_000_000);

        match envelope.body {
            Body::GameStateSync(sync) => {
                assert_eq!(sync.players.len(), 2);
                assert_eq!(sync.players[0].player_id, "p1");
                assert_eq!(sync.players[0].x, Some(1.0));
                assert_eq!(sync.players[1].facing_right, Some(false));
            }
            _ => panic!("Wrong body variant"),
        }
    }

    #[test]
    fn test_partial_player_entry_deserializes() {
        let raw = r#"{"playerId": "p3", "x": 7.5}"#;
        let entry: PlayerEntry = serde_json::from_str(raw).unwrap();

        assert_eq!(entry.player_id, "p3");
        assert_eq!(entry.x, Some(7.5));
        assert_eq!(entry.y, None);
        assert_eq!(entry.vx, None);
        assert_eq!(entry.animation, None);
    }

    #[test]
    fn test_attack_attacker_id_omitted_client_side() {
        let envelope = Envelope::new(
            Body::PlayerAttack(AttackData {
                attacker_id: None,
                attack_type: "arrow".to_string(),
                x: 40.0,
                y: 50.0,
                direction: "right".to_string(),
                facing_right: true,
                timestamp: 42,
            }),
            42,
        );
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], "player_attack");
        assert_eq!(value["data"]["attackType"], "arrow");
        assert!(value["data"].get("attackerId").is_none());
    }

    #[test]
    fn test_position_correction_from_server_json() {
        let raw = r#"{"type": "position_correction",
                      "data": {"x": 100.0, "y": 200.0, "vx": 0.0, "vy": 0.0},
                      "timestamp": 5}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();

        match envelope.body {
            Body::PositionCorrection(c) => {
                assert_eq!(c.x, 100.0);
                assert_eq!(c.y, 200.0);
            }
            _ => panic!("Wrong body variant"),
        }
    }
}
