//! The client's mirror of the server world and its per-frame update.

use flagrun_config::ReplicationConfig;
use flagrun_multiplayer::{
    ClientClock, Entity, EntityId, ReconcileOutcome, ReconcilerConfig, Role, World,
};
use flagrun_net::{ClientMessage, ShotHit};
use glam::Vec2;

/// Reconciler tuning from the replication config section.
pub fn reconciler_config(config: &ReplicationConfig) -> ReconcilerConfig {
    ReconcilerConfig {
        movement_delay_ms: config.movement_delay_ms,
        prediction_error_threshold: config.prediction_error_threshold,
        max_pending: config.max_pending_snapshots,
        goal_distance_threshold: config.goal_distance_threshold,
    }
}

/// Local world, clock and identity of one client.
#[derive(Debug)]
pub struct ClientWorld {
    /// Mirrored entities and teams.
    pub world: World,
    /// Server time estimate.
    pub clock: ClientClock,
    pub(crate) reconciler: ReconcilerConfig,
    prediction_enabled: bool,
    local_player: Option<EntityId>,
    last_update: Option<i64>,
}

impl Default for ClientWorld {
    fn default() -> Self {
        Self::new(ReconcilerConfig::default(), true)
    }
}

impl ClientWorld {
    /// Empty mirror.
    pub fn new(reconciler: ReconcilerConfig, prediction_enabled: bool) -> Self {
        Self {
            world: World::new(Role::Client),
            clock: ClientClock::new(),
            reconciler,
            prediction_enabled,
            local_player: None,
            last_update: None,
        }
    }

    /// Reconciler tuning in use.
    pub fn reconciler_config(&self) -> &ReconcilerConfig {
        &self.reconciler
    }

    /// Id of the entity this client controls, once the server said so.
    pub fn local_player_id(&self) -> Option<EntityId> {
        self.local_player
    }

    pub(crate) fn set_local_player_id(&mut self, id: EntityId) {
        self.local_player = Some(id);
    }

    /// The controlled entity, once it has arrived.
    pub fn local_player(&self) -> Option<&Entity> {
        self.local_player.and_then(|id| self.world.entity(id))
    }

    /// Advance one frame at the clock's current estimate of server time.
    pub fn update(&mut self) -> bool {
        let now = self.clock.now();
        self.update_at(now).is_some()
    }

    /// Advance one frame at server time `now`.
    ///
    /// Does nothing until the local player entity exists. Then: mark it
    /// predicted, step physics (no touches), reconcile every moveable
    /// entity, sweep deleted entities. Returns the reconcile outcomes.
    pub fn update_at(&mut self, now: i64) -> Option<Vec<(EntityId, ReconcileOutcome)>> {
        let id = self.local_player?;
        let prediction_enabled = self.prediction_enabled;
        let player = self.world.entity_mut(id)?;
        if prediction_enabled && !player.is_predicted() {
            tracing::debug!("Local player {id} arrived, predicting");
            player.set_predicted(true);
        }

        let elapsed = self.last_update.map_or(0, |last| (now - last).max(0));
        self.last_update = Some(now);

        self.world.physics_step(elapsed as f32, None);
        let outcomes = self.world.reconcile_motion(&self.reconciler, now);
        let swept = self.world.registry.sweep_dead();
        if !swept.is_empty() {
            tracing::debug!("Removed {} deleted entities", swept.len());
        }
        Some(outcomes)
    }

    // -- local input -------------------------------------------------------

    /// Apply a key event to the predicted player and build the message for
    /// the server.
    pub fn key_event(&mut self, key_code: i32, pressed: bool, now: i64) -> ClientMessage {
        if let Some(entity) = self.local_player.and_then(|id| self.world.entity_mut(id)) {
            if entity.is_predicted() {
                if let Some((player, _)) = entity.player_mut() {
                    if !player.is_dead() {
                        player.keys.apply(key_code, pressed);
                        let velocity = player.keys.velocity(player.speed());
                        entity.set_velocity(velocity, now);
                    }
                }
            }
        }
        ClientMessage::KeyboardInput { key_code, pressed }
    }

    /// Build a shot towards `aim` with the hits of a local trace from the
    /// player's position.
    pub fn fire(&self, aim: Vec2) -> Option<ClientMessage> {
        let player = self.local_player()?;
        let origin = player.position();
        let hits = self
            .world
            .trace(origin, aim - origin, player.id())
            .into_iter()
            .map(|hit| ShotHit {
                entity_id: hit.id,
                points: hit.points,
            })
            .collect();
        Some(ClientMessage::GunShot { aim, hits })
    }
}

#[cfg(test)]
mod tests {
    use flagrun_multiplayer::input::KEY_D;
    use flagrun_multiplayer::{Block, PlayerClass};

    use super::*;

    fn with_player(id: i32) -> ClientWorld {
        let mut client = ClientWorld::default();
        let mut player = Entity::player(Role::Client, Vec2::ZERO, PlayerClass::Goat);
        player.set_id(EntityId(id));
        client.world.registry.insert(player);
        client.set_local_player_id(EntityId(id));
        client
    }

    #[test]
    fn test_update_waits_for_local_player() {
        let mut client = ClientWorld::default();
        assert!(client.update_at(0).is_none());
        client.set_local_player_id(EntityId(3));
        assert!(client.update_at(0).is_none());
    }

    #[test]
    fn test_local_player_becomes_predicted() {
        let mut client = with_player(3);
        assert!(client.update_at(0).is_some());
        assert!(client.local_player().is_some_and(Entity::is_predicted));
    }

    #[test]
    fn test_prediction_can_be_disabled() {
        let mut client = ClientWorld::new(ReconcilerConfig::default(), false);
        let mut player = Entity::player(Role::Client, Vec2::ZERO, PlayerClass::Goat);
        player.set_id(EntityId(1));
        client.world.registry.insert(player);
        client.set_local_player_id(EntityId(1));

        client.update_at(0);
        assert!(!client.local_player().is_some_and(Entity::is_predicted));
        client.key_event(KEY_D, true, 0);
        assert_eq!(client.local_player().map(Entity::velocity), Some(Vec2::ZERO));
    }

    #[test]
    fn test_key_event_moves_predicted_player() {
        let mut client = with_player(1);
        client.update_at(0);

        let message = client.key_event(KEY_D, true, 0);
        assert_eq!(
            message,
            ClientMessage::KeyboardInput {
                key_code: KEY_D,
                pressed: true
            }
        );
        client.update_at(30);

        let player = client.local_player().unwrap();
        assert_eq!(player.velocity(), Vec2::new(5.0, 0.0));
        assert_eq!(player.position(), Vec2::new(10.0, 0.0));
        assert_eq!(player.motion().map(|m| m.sequence()), Some(1));
    }

    #[test]
    fn test_fire_traces_local_hits() {
        let mut client = with_player(1);
        let mut wall = Entity::textured_block(
            Role::Client,
            Vec2::new(100.0, 0.0),
            Block {
                width: 20,
                height: 20,
                texture: "crate".into(),
            },
        );
        wall.set_id(EntityId(2));
        client.world.registry.insert(wall);

        let Some(ClientMessage::GunShot { aim, hits }) = client.fire(Vec2::new(200.0, 0.0)) else {
            panic!("no shot");
        };
        assert_eq!(aim, Vec2::new(200.0, 0.0));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity_id, 2);
        assert_eq!(hits[0].points.len(), 2);
    }
}
