//! Applying server messages to the client's mirror.

use flagrun_multiplayer::{ApplyError, ServerMessage, Team};

use crate::client_world::ClientWorld;

/// Applies decoded [`ServerMessage`]s to a [`ClientWorld`].
///
/// Errors returned here are protocol-soft: the message was complete and the
/// stream stays in sync, only this message's effect is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplicationReceiver;

impl ReplicationReceiver {
    /// Apply one message.
    pub fn apply(&self, client: &mut ClientWorld, message: ServerMessage) -> Result<(), ApplyError> {
        match message {
            ServerMessage::CreateEntities(entities) => {
                for entity in entities {
                    let id = entity.id();
                    if !client.world.registry.insert(entity) {
                        tracing::debug!("Entity {id} already exists, creation ignored");
                    }
                }
            }
            ServerMessage::DeleteEntities(ids) => {
                for id in ids {
                    client.world.registry.mark_dead(id);
                }
            }
            ServerMessage::UpdateEntityField {
                entity,
                field,
                value,
            } => {
                let config = client.reconciler;
                let target = client
                    .world
                    .entity_mut(entity)
                    .ok_or(ApplyError::UnknownEntity(entity))?;
                target.apply_update(field, &value, &config)?;
            }
            ServerMessage::SetPlayerId(id) => {
                tracing::info!("Controlling {id}");
                client.set_local_player_id(id);
            }
            ServerMessage::SetBackground(texture) => client.world.set_background(texture),
            ServerMessage::SetServerTime(now) => client.clock.sync(now),
            ServerMessage::CreateTeams(records) => {
                for record in records {
                    client.world.teams.insert(Team::from(record));
                }
            }
            ServerMessage::TeamScoreChange { team, score } => {
                if !client.world.teams.apply_score(team, score) {
                    return Err(ApplyError::UnknownTeam(team));
                }
            }
        }
        Ok(())
    }

    /// Apply one message, logging and dropping protocol-soft failures.
    pub fn apply_logged(&self, client: &mut ClientWorld, message: ServerMessage) {
        let tag = message.tag();
        if let Err(e) = self.apply(client, message) {
            tracing::debug!("Dropped {tag:?}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use flagrun_multiplayer::{
        Entity, EntityId, FieldId, FieldValue, PlayerClass, Role, TeamId, TeamRecord,
        VelocitySnapshot,
    };
    use glam::Vec2;

    use super::*;

    fn server_entity(entity: Entity, id: i32) -> Entity {
        let mut entity = entity;
        entity.set_id(EntityId(id));
        let mut buf = BytesMut::new();
        entity.encode(&mut buf);
        let mut cursor: &[u8] = &buf;
        Entity::decode(&mut cursor).unwrap()
    }

    fn encoded<T: FieldValue>(value: T) -> bytes::Bytes {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        buf.freeze()
    }

    #[test]
    fn test_bool_field_update_reaches_mirror() {
        let mut client = ClientWorld::default();
        let receiver = ReplicationReceiver;
        let player = Entity::player(Role::Server, Vec2::ZERO, PlayerClass::Goat);
        let is_dead = player.as_player().map(|p| p.is_dead.id()).unwrap();

        receiver
            .apply(
                &mut client,
                ServerMessage::CreateEntities(vec![server_entity(player, 7)]),
            )
            .unwrap();
        let dead = |client: &ClientWorld| {
            client
                .world
                .entity(EntityId(7))
                .and_then(Entity::as_player)
                .map(|p| p.is_dead())
        };
        assert_eq!(dead(&client), Some(false));

        receiver
            .apply(
                &mut client,
                ServerMessage::UpdateEntityField {
                    entity: EntityId(7),
                    field: is_dead,
                    value: encoded(true),
                },
            )
            .unwrap();
        assert_eq!(dead(&client), Some(true));
    }

    #[test]
    fn test_duplicate_creation_keeps_first() {
        let mut client = ClientWorld::default();
        let receiver = ReplicationReceiver;
        let first = server_entity(Entity::flag(Role::Server, Vec2::ZERO), 1);
        let second = server_entity(Entity::flag(Role::Server, Vec2::ONE), 1);

        receiver
            .apply(&mut client, ServerMessage::CreateEntities(vec![first, second]))
            .unwrap();

        assert_eq!(client.world.registry.len(), 1);
        assert_eq!(client.world.entity(EntityId(1)).map(Entity::position), Some(Vec2::ZERO));
    }

    #[test]
    fn test_soft_failures() {
        let mut client = ClientWorld::default();
        let receiver = ReplicationReceiver;
        receiver
            .apply(
                &mut client,
                ServerMessage::CreateEntities(vec![server_entity(
                    Entity::flag(Role::Server, Vec2::ZERO),
                    1,
                )]),
            )
            .unwrap();

        assert_eq!(
            receiver.apply(
                &mut client,
                ServerMessage::UpdateEntityField {
                    entity: EntityId(9),
                    field: FieldId(0),
                    value: encoded(Vec2::ONE),
                },
            ),
            Err(ApplyError::UnknownEntity(EntityId(9)))
        );
        assert_eq!(
            receiver.apply(
                &mut client,
                ServerMessage::UpdateEntityField {
                    entity: EntityId(1),
                    field: FieldId(12),
                    value: encoded(1i32),
                },
            ),
            Err(ApplyError::UnknownField {
                entity: EntityId(1),
                field: FieldId(12)
            })
        );
        assert_eq!(
            receiver.apply(
                &mut client,
                ServerMessage::TeamScoreChange {
                    team: TeamId(4),
                    score: 1
                }
            ),
            Err(ApplyError::UnknownTeam(TeamId(4)))
        );
    }

    #[test]
    fn test_delete_removes_on_next_update() {
        let mut client = ClientWorld::default();
        let receiver = ReplicationReceiver;
        let player = server_entity(Entity::player(Role::Server, Vec2::ZERO, PlayerClass::Zebra), 0);
        let flag = server_entity(Entity::flag(Role::Server, Vec2::ZERO), 1);
        receiver.apply_logged(&mut client, ServerMessage::CreateEntities(vec![player, flag]));
        receiver.apply_logged(&mut client, ServerMessage::SetPlayerId(EntityId(0)));

        receiver.apply_logged(&mut client, ServerMessage::DeleteEntities(vec![EntityId(1)]));
        assert!(client.world.entity(EntityId(1)).is_some());

        client.update_at(0);
        assert!(client.world.entity(EntityId(1)).is_none());
    }

    #[test]
    fn test_teams_time_and_background() {
        let mut client = ClientWorld::default();
        let receiver = ReplicationReceiver;
        receiver.apply_logged(
            &mut client,
            ServerMessage::CreateTeams(vec![TeamRecord {
                id: TeamId(0),
                name: "Red".into(),
                score: 2,
                capture_region: Some(EntityId(3)),
            }]),
        );
        receiver.apply_logged(
            &mut client,
            ServerMessage::TeamScoreChange {
                team: TeamId(0),
                score: 3,
            },
        );
        receiver.apply_logged(&mut client, ServerMessage::SetBackground("sand".into()));
        receiver.apply_logged(&mut client, ServerMessage::SetServerTime(50_000));

        let team = client.world.teams.get(TeamId(0)).unwrap();
        assert_eq!((team.name.as_str(), team.score), ("Red", 3));
        assert_eq!(team.capture_region, Some(EntityId(3)));
        assert_eq!(client.world.background(), "sand");
        assert!(client.clock.now() >= 50_000);
    }

    #[test]
    fn test_eleven_snapshots_flush_to_last() {
        let mut client = ClientWorld::default();
        let receiver = ReplicationReceiver;
        let local = server_entity(Entity::player(Role::Server, Vec2::ZERO, PlayerClass::Goat), 0);
        let other = server_entity(
            Entity::player(Role::Server, Vec2::new(300.0, 300.0), PlayerClass::Goat),
            1,
        );
        receiver.apply_logged(&mut client, ServerMessage::CreateEntities(vec![local, other]));
        receiver.apply_logged(&mut client, ServerMessage::SetPlayerId(EntityId(0)));

        for sequence in 1..=11 {
            let snapshot = VelocitySnapshot::new(
                Vec2::new(300.0 + sequence as f32, 300.0),
                Vec2::new(sequence as f32 * 0.1, 0.0),
                1_000 + i64::from(sequence),
                sequence,
            );
            receiver
                .apply(
                    &mut client,
                    ServerMessage::UpdateEntityField {
                        entity: EntityId(1),
                        field: FieldId(1),
                        value: encoded(snapshot),
                    },
                )
                .unwrap();
        }

        let outcomes = client.update_at(1_012).unwrap();
        assert!(outcomes.contains(&(EntityId(1), flagrun_multiplayer::ReconcileOutcome::Flushed)));

        let other = client.world.entity(EntityId(1)).unwrap();
        assert_eq!(other.position(), Vec2::new(311.0, 300.0));
        assert!((other.velocity().x - 1.1).abs() < 1e-6);
        let reconciler = other.motion().unwrap().reconciler();
        assert_eq!(reconciler.state(), flagrun_multiplayer::MotionState::Idle);
        assert_eq!(reconciler.pending_len(), 0);
    }
}
