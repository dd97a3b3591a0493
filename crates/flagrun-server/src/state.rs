//! Authoritative server state and the tick that advances it.
//!
//! Only the tick task touches a [`ServerState`]. Connection tasks report
//! through [`ConnectionEvent`]s, which are applied at the start of the next
//! tick, so rosters, connections and the registry change in one place.

use flagrun_multiplayer::{Entity, EntityId, PlayerClass, Role, World};
use flagrun_net::{ClientMessage, ConnectionEvent, ConnectionId, ShotHit};
use glam::Vec2;

use crate::channel::ReplicationChannel;
use crate::hooks::GameplayHooks;

/// Longest stretch of time one tick simulates.
///
/// A server that stalls (suspended process, debugger) resumes with a
/// single bounded step instead of replaying the whole gap.
pub const MAX_TICK_ELAPSED_MS: i64 = 1_000;

/// World, connections and game rules of one running server.
pub struct ServerState {
    world: World,
    channel: ReplicationChannel,
    hooks: Box<dyn GameplayHooks>,
    last_tick: Option<i64>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("entities", &self.world.registry.len())
            .field("connections", &self.channel.live().len())
            .field("last_tick", &self.last_tick)
            .finish()
    }
}

impl ServerState {
    /// State around a populated server world.
    pub fn new(world: World, hooks: Box<dyn GameplayHooks>) -> Self {
        debug_assert_eq!(world.role(), Role::Server);
        Self {
            world,
            channel: ReplicationChannel::new(),
            hooks,
            last_tick: None,
        }
    }

    /// The authoritative world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world; changes are broadcast on the next tick.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Connections and broadcast state.
    pub fn channel(&self) -> &ReplicationChannel {
        &self.channel
    }

    /// Player entity controlled by `connection`.
    pub fn player_of(&self, connection: ConnectionId) -> Option<EntityId> {
        self.channel.connection(connection).map(|c| c.player)
    }

    // -- events ------------------------------------------------------------

    /// Apply one connection event at world time `now`.
    pub fn handle_event(&mut self, event: ConnectionEvent, now: i64) {
        match event {
            ConnectionEvent::Opened { id, peer, outbound } => {
                tracing::debug!("Connection {id:?} from {peer} waiting for connect");
                self.channel.open(outbound);
            }
            ConnectionEvent::Message { id, message } => self.handle_message(id, message, now),
            ConnectionEvent::Closed { id } => self.remove_connection(id),
        }
    }

    fn handle_message(&mut self, id: ConnectionId, message: ClientMessage, now: i64) {
        if let ClientMessage::Connect = message {
            self.join(id, now);
            return;
        }

        let Some(player) = self.player_of(id) else {
            tracing::debug!("Ignoring {:?} from {id:?} before connect", message.tag());
            return;
        };

        match message {
            ClientMessage::Connect => {}
            ClientMessage::KeyboardInput { key_code, pressed } => {
                self.keyboard_input(player, key_code, pressed, now);
            }
            ClientMessage::MousePosition(target) => self.mouse_position(player, target),
            ClientMessage::GunShot { aim, hits } => self.gun_shot(player, aim, &hits, now),
        }
    }

    /// Create the connection's player and send it the world.
    fn join(&mut self, id: ConnectionId, now: i64) {
        let Some(outbound) = self.channel.take_pending(id) else {
            tracing::debug!("Duplicate connect from {id:?} ignored");
            return;
        };

        let team = self.world.teams.team_to_join();
        let spawn = team
            .and_then(|team| self.world.teams.get(team))
            .map_or(Vec2::ZERO, |team| team.spawn);
        let class = PlayerClass::random(&mut rand::rng());

        let mut entity = Entity::player(Role::Server, spawn, class);
        if let Some((player, _)) = entity.player_mut() {
            player.team.set_local(team);
        }
        let player = self.world.registry.register(entity);
        if let Some(team) = team {
            self.world.teams.add_player(team, player);
        }

        tracing::info!(
            "Connection {id:?} joined as {player} ({}) on {:?}",
            class.name(),
            team
        );
        self.hooks.on_player_joined(&mut self.world, player, now);

        if self.channel.join(&self.world, outbound, player, now).is_err() {
            tracing::warn!("Connection {id:?} closed during join");
        }
    }

    /// Drop a connection and its player.
    fn remove_connection(&mut self, id: ConnectionId) {
        let Some(connection) = self.channel.remove(id) else {
            tracing::debug!("Connection {id:?} closed before joining");
            return;
        };
        tracing::info!("Connection {id:?} left, removing {}", connection.player);
        self.world.registry.mark_dead(connection.player);
        self.world.teams.remove_player(connection.player);
    }

    // -- input -------------------------------------------------------------

    fn keyboard_input(&mut self, player: EntityId, key_code: i32, pressed: bool, now: i64) {
        let Some(entity) = self.world.entity_mut(player) else {
            return;
        };
        let Some((state, _)) = entity.player_mut() else {
            return;
        };
        if state.is_dead() {
            return;
        }
        state.keys.apply(key_code, pressed);
        let velocity = state.keys.velocity(state.speed());
        entity.set_velocity(velocity, now);
    }

    fn mouse_position(&mut self, player: EntityId, target: Vec2) {
        let Some(entity) = self.world.entity_mut(player) else {
            return;
        };
        let position = entity.position();
        if let Some((state, outbox)) = entity.player_mut() {
            state.aim_at(position, target, outbox);
        }
    }

    fn gun_shot(&mut self, shooter: EntityId, aim: Vec2, hits: &[ShotHit], now: i64) {
        let Some(entity) = self.world.entity_mut(shooter) else {
            return;
        };
        let origin = entity.position();
        let Some((state, outbox)) = entity.player_mut() else {
            return;
        };
        if state.is_dead() {
            return;
        }
        let shooter_team = *state.team.get();
        state.aim_at(origin, aim, outbox);
        state.muzzle_flash.set(true, outbox);

        let mut nearest: Option<(EntityId, Vec2, f32)> = None;
        for hit in hits {
            let target = EntityId(hit.entity_id);
            let Some(entity) = self.world.entity(target) else {
                tracing::debug!("Shot from {shooter} names unknown {target}, skipped");
                continue;
            };
            if let Some(player) = entity.as_player() {
                if shooter_team.is_some() && *player.team.get() == shooter_team {
                    continue;
                }
            }
            for point in &hit.points {
                let distance = point.distance(origin);
                if nearest.is_none_or(|(_, _, best)| distance < best) {
                    nearest = Some((target, *point, distance));
                }
            }
        }

        if let Some((target, point, _)) = nearest {
            self.hooks
                .on_gun_shot(&mut self.world, shooter, target, point, now);
        }
    }

    // -- tick --------------------------------------------------------------

    /// Advance the world to `now` and broadcast the result.
    ///
    /// Order: drop failed connections, physics, game rules, broadcast,
    /// sweep dead entities.
    pub fn tick(&mut self, now: i64) {
        for id in self.channel.take_failed() {
            self.remove_connection(id);
        }

        let mut elapsed = self.last_tick.map_or(0, |last| (now - last).max(0));
        if elapsed > MAX_TICK_ELAPSED_MS {
            tracing::warn!(elapsed, "Tick fell behind, clamping step to {MAX_TICK_ELAPSED_MS} ms");
            elapsed = MAX_TICK_ELAPSED_MS;
        }
        self.last_tick = Some(now);

        let mut touches = Vec::new();
        self.world.physics_step(elapsed as f32, Some(&mut touches));
        for touch in touches {
            self.hooks.on_touch(&mut self.world, touch, now);
        }

        self.hooks.on_tick(&mut self.world, now);

        self.channel.broadcast(&mut self.world, now);

        for entity in self.world.registry.sweep_dead() {
            self.world.teams.remove_player(entity.id());
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
