//! Extension points for game rules.
//!
//! The replication core moves entities, applies input and broadcasts state.
//! What a touch, a shot or a new player *means* (flag pickup, damage,
//! scoring, respawn) is decided by a [`GameplayHooks`] implementation that
//! runs on the tick task with full access to the world.

use flagrun_multiplayer::{EntityId, World};
use flagrun_physics::Touch;
use glam::Vec2;

/// Game rules called from the tick task.
///
/// Every method has an empty default so rules implement only what they need.
pub trait GameplayHooks: Send {
    /// A player entity was registered for a new connection.
    fn on_player_joined(&mut self, _world: &mut World, _player: EntityId, _now: i64) {}

    /// A moving entity overlapped a touchable one during physics.
    fn on_touch(&mut self, _world: &mut World, _touch: Touch, _now: i64) {}

    /// `shooter` fired and the nearest valid hit was `target` at `point`.
    fn on_gun_shot(
        &mut self,
        _world: &mut World,
        _shooter: EntityId,
        _target: EntityId,
        _point: Vec2,
        _now: i64,
    ) {
    }

    /// Once per tick, after physics and before the broadcast.
    fn on_tick(&mut self, _world: &mut World, _now: i64) {}
}

/// Rules that do nothing: entities move and replicate, nothing else happens.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGameplay;

impl GameplayHooks for NoGameplay {}
