//! Server-to-client messages.
//!
//! Writers append one tagged message to a buffer so the server can encode a
//! batch once and share the bytes between connections. [`ServerMessage`]
//! is the decoded form read by clients.

use bytes::{BufMut, Bytes, BytesMut};
use flagrun_net::{
    DecodeError, ServerMessageTag, WireDecode, WireRead, WireWrite, codec::capacity_hint,
};

use crate::entity::Entity;
use crate::field::FieldId;
use crate::ids::{EntityId, TeamId};
use crate::team::TeamRecord;

/// One decoded server message.
#[derive(Debug)]
pub enum ServerMessage {
    /// Entities to add, in creation order.
    CreateEntities(Vec<Entity>),
    /// Entities to remove.
    DeleteEntities(Vec<EntityId>),
    /// New encoded value for one field.
    UpdateEntityField {
        /// Target entity.
        entity: EntityId,
        /// Target field.
        field: FieldId,
        /// Exactly one encoded value.
        value: Bytes,
    },
    /// Entity the receiving client controls.
    SetPlayerId(EntityId),
    /// Background texture name.
    SetBackground(String),
    /// Current server time.
    SetServerTime(i64),
    /// Teams to add.
    CreateTeams(Vec<TeamRecord>),
    /// New score for one team.
    TeamScoreChange {
        /// Team.
        team: TeamId,
        /// New score.
        score: i32,
    },
}

impl ServerMessage {
    /// Tag this message travels under.
    pub fn tag(&self) -> ServerMessageTag {
        match self {
            Self::CreateEntities(_) => ServerMessageTag::CreateEntities,
            Self::DeleteEntities(_) => ServerMessageTag::DeleteEntities,
            Self::UpdateEntityField { .. } => ServerMessageTag::UpdateEntityField,
            Self::SetPlayerId(_) => ServerMessageTag::SetPlayerId,
            Self::SetBackground(_) => ServerMessageTag::SetBackground,
            Self::SetServerTime(_) => ServerMessageTag::SetServerTime,
            Self::CreateTeams(_) => ServerMessageTag::CreateTeam,
            Self::TeamScoreChange { .. } => ServerMessageTag::TeamScoreChange,
        }
    }
}

impl WireDecode for ServerMessage {
    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        let tag = ServerMessageTag::try_from(buf.read_int()?)?;
        Ok(match tag {
            ServerMessageTag::CreateEntities => {
                let count = buf.read_count()?;
                let mut entities = Vec::with_capacity(capacity_hint(count));
                for _ in 0..count {
                    entities.push(Entity::decode(buf)?);
                }
                Self::CreateEntities(entities)
            }
            ServerMessageTag::DeleteEntities => {
                let count = buf.read_count()?;
                let mut ids = Vec::with_capacity(capacity_hint(count));
                for _ in 0..count {
                    ids.push(EntityId(buf.read_int()?));
                }
                Self::DeleteEntities(ids)
            }
            ServerMessageTag::UpdateEntityField => {
                let entity = EntityId(buf.read_int()?);
                let field = FieldId(buf.read_int()?);
                let raw_len = buf.read_int()?;
                let len = usize::try_from(raw_len)
                    .map_err(|_| DecodeError::InvalidLength(raw_len))?;
                let value = Bytes::copy_from_slice(buf.read_slice(len)?);
                Self::UpdateEntityField {
                    entity,
                    field,
                    value,
                }
            }
            ServerMessageTag::SetPlayerId => Self::SetPlayerId(EntityId(buf.read_int()?)),
            ServerMessageTag::SetBackground => Self::SetBackground(buf.read_string()?),
            ServerMessageTag::SetServerTime => Self::SetServerTime(buf.read_long()?),
            ServerMessageTag::CreateTeam => {
                let count = buf.read_count()?;
                let mut teams = Vec::with_capacity(capacity_hint(count));
                for _ in 0..count {
                    teams.push(TeamRecord::decode(buf)?);
                }
                Self::CreateTeams(teams)
            }
            ServerMessageTag::TeamScoreChange => Self::TeamScoreChange {
                team: TeamId(buf.read_int()?),
                score: buf.read_int()?,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn put_tag(buf: &mut BytesMut, tag: ServerMessageTag) {
    buf.put_i32(tag.as_i32());
}

/// Append a create-entities message.
pub fn write_create_entities<'a>(
    buf: &mut BytesMut,
    entities: impl ExactSizeIterator<Item = &'a Entity>,
) {
    put_tag(buf, ServerMessageTag::CreateEntities);
    buf.put_count(entities.len());
    for entity in entities {
        entity.encode(buf);
    }
}

/// Append a delete-entities message.
pub fn write_delete_entities(buf: &mut BytesMut, ids: &[EntityId]) {
    put_tag(buf, ServerMessageTag::DeleteEntities);
    buf.put_count(ids.len());
    for id in ids {
        buf.put_i32(id.0);
    }
}

/// Append an update-field message carrying one encoded value.
pub fn write_field_update(buf: &mut BytesMut, entity: EntityId, field: FieldId, value: &[u8]) {
    put_tag(buf, ServerMessageTag::UpdateEntityField);
    buf.put_i32(entity.0);
    buf.put_i32(field.0);
    buf.put_count(value.len());
    buf.put_slice(value);
}

/// Append a set-player-id message.
pub fn write_player_id(buf: &mut BytesMut, entity: EntityId) {
    put_tag(buf, ServerMessageTag::SetPlayerId);
    buf.put_i32(entity.0);
}

/// Append a set-background message.
pub fn write_background(buf: &mut BytesMut, texture: &str) {
    put_tag(buf, ServerMessageTag::SetBackground);
    buf.put_string(texture);
}

/// Append a time-sync message.
pub fn write_server_time(buf: &mut BytesMut, now: i64) {
    put_tag(buf, ServerMessageTag::SetServerTime);
    buf.put_i64(now);
}

/// Append a create-team message.
pub fn write_create_teams(buf: &mut BytesMut, teams: &[TeamRecord]) {
    put_tag(buf, ServerMessageTag::CreateTeam);
    buf.put_count(teams.len());
    for team in teams {
        team.encode(buf);
    }
}

/// Append a team-score-change message.
pub fn write_team_score(buf: &mut BytesMut, team: TeamId, score: i32) {
    put_tag(buf, ServerMessageTag::TeamScoreChange);
    buf.put_i32(team.0);
    buf.put_i32(score);
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::field::Role;

    fn decode_one(buf: &BytesMut) -> ServerMessage {
        let mut cursor: &[u8] = buf;
        let message = ServerMessage::decode(&mut cursor).unwrap();
        assert!(cursor.is_empty(), "message left trailing bytes");
        message
    }

    #[test]
    fn test_field_update_layout() {
        let mut buf = BytesMut::new();
        write_field_update(&mut buf, EntityId(7), FieldId(6), &[1]);
        assert_eq!(
            &buf[..],
            &[0, 0, 0, 2, 0, 0, 0, 7, 0, 0, 0, 6, 0, 0, 0, 1, 1]
        );
        match decode_one(&buf) {
            ServerMessage::UpdateEntityField {
                entity,
                field,
                value,
            } => {
                assert_eq!((entity, field), (EntityId(7), FieldId(6)));
                assert_eq!(&value[..], &[1]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_truncated_update_is_incomplete() {
        let mut buf = BytesMut::new();
        write_field_update(&mut buf, EntityId(1), FieldId(0), &[0; 8]);
        let mut cursor: &[u8] = &buf[..buf.len() - 1];
        assert_eq!(
            ServerMessage::decode(&mut cursor).err(),
            Some(DecodeError::Incomplete)
        );
    }

    #[test]
    fn test_update_decodes_without_knowing_the_field() {
        // Width comes from the length prefix, so the next message stays aligned.
        let mut buf = BytesMut::new();
        write_field_update(&mut buf, EntityId(40), FieldId(3), &[9; 24]);
        write_server_time(&mut buf, 77);

        let mut cursor: &[u8] = &buf;
        match ServerMessage::decode(&mut cursor).unwrap() {
            ServerMessage::UpdateEntityField { entity, value, .. } => {
                assert_eq!(entity, EntityId(40));
                assert_eq!(value.len(), 24);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            ServerMessage::decode(&mut cursor).unwrap(),
            ServerMessage::SetServerTime(77)
        ));
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_create_entities_batch() {
        let mut first = Entity::flag(Role::Server, Vec2::new(1.0, 2.0));
        first.set_id(EntityId(0));
        let mut second = Entity::capture_region(Role::Server, Vec2::new(3.0, 4.0));
        second.set_id(EntityId(1));
        let mut buf = BytesMut::new();
        write_create_entities(&mut buf, [&first, &second].into_iter());

        let ServerMessage::CreateEntities(entities) = decode_one(&buf) else {
            panic!("wrong message");
        };
        let ids: Vec<EntityId> = entities.iter().map(Entity::id).collect();
        assert_eq!(ids, vec![EntityId(0), EntityId(1)]);
        assert_eq!(entities[1].position(), Vec2::new(3.0, 4.0));
    }

    #[test]
    fn test_unknown_entity_type_is_fatal() {
        let mut buf = BytesMut::new();
        buf.put_i32(ServerMessageTag::CreateEntities.as_i32());
        buf.put_count(1);
        buf.put_string("Dragon");
        let mut cursor: &[u8] = &buf;
        assert_eq!(
            ServerMessage::decode(&mut cursor).err(),
            Some(DecodeError::UnknownEntityType("Dragon".into()))
        );
    }

    #[test]
    fn test_small_messages() {
        let mut buf = BytesMut::new();
        write_server_time(&mut buf, 1_234_567);
        assert!(matches!(decode_one(&buf), ServerMessage::SetServerTime(1_234_567)));

        buf.clear();
        write_background(&mut buf, "sand");
        assert!(matches!(decode_one(&buf), ServerMessage::SetBackground(name) if name == "sand"));

        buf.clear();
        write_delete_entities(&mut buf, &[EntityId(3), EntityId(9)]);
        assert!(matches!(
            decode_one(&buf),
            ServerMessage::DeleteEntities(ids) if ids == vec![EntityId(3), EntityId(9)]
        ));

        buf.clear();
        write_team_score(&mut buf, TeamId(1), 4);
        assert!(matches!(
            decode_one(&buf),
            ServerMessage::TeamScoreChange { team: TeamId(1), score: 4 }
        ));
    }
}
