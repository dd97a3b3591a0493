//! Server-side replication: join snapshots and the per-tick broadcast.
//!
//! Each tick every live connection receives, in order:
//!
//! 1. a time sync,
//! 2. a deletion batch, if entities died this tick,
//! 3. a creation batch, if entities were registered since the last tick,
//! 4. one update message per field set (no deduplication),
//! 5. team score changes.
//!
//! The shared parts are encoded once per tick and handed to every
//! connection's outbound queue as reference-counted [`Bytes`].

use bytes::{Bytes, BytesMut};
use flagrun_multiplayer::messages::{
    write_background, write_create_entities, write_create_teams, write_delete_entities,
    write_field_update, write_player_id, write_server_time, write_team_score,
};
use flagrun_multiplayer::{Entity, EntityId, World};
use flagrun_net::{ConnectionClosed, ConnectionId, Outbound};
use rustc_hash::FxHashMap;

/// A connection that has joined and controls a player entity.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Transport connection.
    pub id: ConnectionId,
    /// Outbound queue.
    pub outbound: Outbound,
    /// Controlled player entity.
    pub player: EntityId,
    /// Highest entity id contained in the join snapshot, until the first
    /// creation broadcast after joining.
    known_through: Option<i32>,
}

/// Connections and the bookkeeping needed to keep their mirrors in sync.
#[derive(Debug)]
pub struct ReplicationChannel {
    pending: FxHashMap<ConnectionId, Outbound>,
    live: Vec<Connection>,
    /// Highest entity id already announced to live connections.
    announced_through: i32,
    failed: Vec<ConnectionId>,
}

impl Default for ReplicationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicationChannel {
    /// No connections.
    pub fn new() -> Self {
        Self {
            pending: FxHashMap::default(),
            live: Vec::new(),
            announced_through: EntityId::NONE,
            failed: Vec::new(),
        }
    }

    /// Track an accepted connection that has not sent connect yet.
    pub fn open(&mut self, outbound: Outbound) {
        self.pending.insert(outbound.id(), outbound);
    }

    /// Take a pending connection's queue so it can join.
    pub fn take_pending(&mut self, id: ConnectionId) -> Option<Outbound> {
        self.pending.remove(&id)
    }

    /// Whether `id` is a live connection.
    pub fn is_live(&self, id: ConnectionId) -> bool {
        self.live.iter().any(|connection| connection.id == id)
    }

    /// Live connection with `id`.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.live.iter().find(|connection| connection.id == id)
    }

    /// Live connections in join order.
    pub fn live(&self) -> &[Connection] {
        &self.live
    }

    /// Send the join snapshot and make the connection live.
    ///
    /// Snapshot order: every entity, every team, background, time, then the
    /// id of the controlled player.
    pub fn join(
        &mut self,
        world: &World,
        outbound: Outbound,
        player: EntityId,
        now: i64,
    ) -> Result<(), ConnectionClosed> {
        let mut buf = BytesMut::new();
        let entities: Vec<&Entity> = world.registry.iter().collect();
        write_create_entities(&mut buf, entities.iter().copied());
        write_create_teams(&mut buf, &world.teams.records());
        write_background(&mut buf, world.background());
        write_server_time(&mut buf, now);
        write_player_id(&mut buf, player);

        let known_through = entities.iter().map(|entity| entity.id().0).max();
        let id = outbound.id();
        let sent = outbound.send(buf.freeze());

        self.live.push(Connection {
            id,
            outbound,
            player,
            known_through,
        });
        if sent.is_err() {
            self.fail(id);
        }
        sent
    }

    /// Forget a connection, pending or live. Returns the live entry.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.pending.remove(&id);
        self.failed.retain(|failed| *failed != id);
        let slot = self.live.iter().position(|connection| connection.id == id)?;
        Some(self.live.remove(slot))
    }

    /// Connections whose last write failed, to be removed on the next tick.
    pub fn take_failed(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.failed)
    }

    fn fail(&mut self, id: ConnectionId) {
        if !self.failed.contains(&id) {
            tracing::warn!("Write to connection {id:?} failed, dropping it");
            self.failed.push(id);
        }
    }

    /// Broadcast this tick's changes to every live connection.
    ///
    /// Drains every entity's queued field updates and the teams' score
    /// changes. Entities pending removal are announced as deleted, not
    /// updated or created.
    pub fn broadcast(&mut self, world: &mut World, now: i64) {
        let dead = world.registry.pending_dead().to_vec();
        let is_dead = |id: EntityId| dead.contains(&id);

        let mut updates = BytesMut::new();
        let mut update_count = 0usize;
        for entity in world.registry.iter_mut() {
            let changed = entity.take_updates();
            if is_dead(entity.id()) {
                continue;
            }
            for (field, value) in changed {
                write_field_update(&mut updates, entity.id(), field, &value);
                update_count += 1;
            }
        }
        for (team, score) in world.teams.drain_score_changes() {
            write_team_score(&mut updates, team, score);
        }

        let created: Vec<&Entity> = world
            .registry
            .iter()
            .filter(|entity| entity.id().0 > self.announced_through && !is_dead(entity.id()))
            .collect();
        if let Some(highest) = world.registry.iter().map(|entity| entity.id().0).max() {
            self.announced_through = self.announced_through.max(highest);
        }

        if self.live.is_empty() {
            return;
        }

        let mut head = BytesMut::new();
        write_server_time(&mut head, now);
        if !dead.is_empty() {
            write_delete_entities(&mut head, &dead);
        }
        let head = head.freeze();
        let updates = updates.freeze();

        let creations = encode_creations(&created, None);
        let mut failed = Vec::new();

        for connection in &mut self.live {
            if self.failed.contains(&connection.id) {
                continue;
            }

            let creations = match connection.known_through.take() {
                Some(known) => encode_creations(&created, Some(known)),
                None => creations.clone(),
            };

            let result = connection
                .outbound
                .send(head.clone())
                .and_then(|()| match &creations {
                    Some(bytes) => connection.outbound.send(bytes.clone()),
                    None => Ok(()),
                })
                .and_then(|()| {
                    if updates.is_empty() {
                        Ok(())
                    } else {
                        connection.outbound.send(updates.clone())
                    }
                });
            if result.is_err() {
                failed.push(connection.id);
            }
        }

        for id in failed {
            self.fail(id);
        }

        if !created.is_empty() || !dead.is_empty() {
            tracing::debug!(
                created = created.len(),
                deleted = dead.len(),
                updates = update_count,
                connections = self.live.len(),
                "Broadcast"
            );
        }
    }
}

/// Creation batch for entities with ids above `known_through`, if any.
fn encode_creations(created: &[&Entity], known_through: Option<i32>) -> Option<Bytes> {
    let fresh: Vec<&Entity> = created
        .iter()
        .copied()
        .filter(|entity| known_through.is_none_or(|known| entity.id().0 > known))
        .collect();
    if fresh.is_empty() {
        return None;
    }
    let mut buf = BytesMut::new();
    write_create_entities(&mut buf, fresh.into_iter());
    Some(buf.freeze())
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
