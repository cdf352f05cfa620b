//! Collaborator seams between the sync core and the rest of the game.
//!
//! The core never reaches into ambient state: gameplay access is injected
//! through [`EntityRegistry`], and everything observable it produces beyond
//! render positions is queued as [`SyncEvent`]s drained once per tick by the
//! HUD and entity-lifecycle collaborators.

use crate::snapshot::EntityId;
use protocol::{AttackData, DeathData, HitData, RespawnData};

/// The local player's state as sampled from the gameplay layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalEntityState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub animation: String,
    pub facing_right: bool,
}

/// Derived render state published once per tick for each remote entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub x: f32,
    pub y: f32,
    pub animation: String,
    pub facing_right: bool,
}

/// Gameplay-layer access injected into the sync core.
pub trait EntityRegistry {
    /// Identity of the locally controlled player, if one exists yet.
    fn local_entity_id(&self) -> Option<EntityId>;

    /// Remote entities currently alive in the gameplay layer.
    fn remote_entity_ids(&self) -> Vec<EntityId>;

    /// Samples the local player for transmission and reconciliation.
    fn sample_local(&self) -> Option<LocalEntityState>;

    /// Applies a reconciliation snap to the local player's position.
    fn apply_local_position(&mut self, x: f32, y: f32);

    /// Publishes the interpolated/extrapolated render state for a remote
    /// entity.
    fn publish_render(&mut self, entity_id: &EntityId, state: RenderState);
}

/// Observable outcome of a tick, consumed by external collaborators.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A snapshot referenced an entity this client has no channel for. The
    /// lifecycle collaborator decides whether to materialize it; the core
    /// never creates entities implicitly.
    UnknownEntity { entity_id: EntityId },
    /// Local prediction diverged past the threshold and was snapped.
    LocalSnap { error: f32, x: f32, y: f32 },
    /// Combat pass-throughs, applied by the gameplay layer rather than here.
    Attack(AttackData),
    Hit(HitData),
    Death(DeathData),
    Respawn(RespawnData),
}
