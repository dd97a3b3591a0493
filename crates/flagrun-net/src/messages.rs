//! Message tags and client-to-server messages.
//!
//! Server-to-client message bodies reference entities and teams, so they are
//! defined next to those types in `flagrun-multiplayer`; this module only
//! fixes their tag numbering.

use bytes::{BufMut, BytesMut};
use glam::Vec2;

use crate::codec::{DecodeError, WireDecode, WireRead, WireWrite, capacity_hint};

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Server-to-client message tags, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ServerMessageTag {
    /// Batch of entity creation records.
    CreateEntities = 0,
    /// Batch of entity ids to delete.
    DeleteEntities = 1,
    /// New value for one field of one entity.
    UpdateEntityField = 2,
    /// Entity id the receiving client controls.
    SetPlayerId = 3,
    /// Background texture name.
    SetBackground = 4,
    /// Current server time in milliseconds.
    SetServerTime = 5,
    /// Batch of team records.
    CreateTeam = 6,
    /// New score for one team.
    TeamScoreChange = 7,
}

impl ServerMessageTag {
    /// Wire value of this tag.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for ServerMessageTag {
    type Error = DecodeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::CreateEntities,
            1 => Self::DeleteEntities,
            2 => Self::UpdateEntityField,
            3 => Self::SetPlayerId,
            4 => Self::SetBackground,
            5 => Self::SetServerTime,
            6 => Self::CreateTeam,
            7 => Self::TeamScoreChange,
            other => return Err(DecodeError::UnknownTag(other)),
        })
    }
}

/// Client-to-server message tags, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ClientMessageTag {
    /// Join request.
    Connect = 0,
    /// Key press or release.
    KeyboardInput = 1,
    /// A fired shot with the client's hit candidates.
    GunShotInfo = 2,
    /// Mouse position in map coordinates.
    MousePosition = 3,
}

impl TryFrom<i32> for ClientMessageTag {
    type Error = DecodeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Connect,
            1 => Self::KeyboardInput,
            2 => Self::GunShotInfo,
            3 => Self::MousePosition,
            other => return Err(DecodeError::UnknownTag(other)),
        })
    }
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// One body crossed by a client-side shot trace.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotHit {
    /// Entity id the client believes it hit.
    pub entity_id: i32,
    /// Outline crossing points.
    pub points: Vec<Vec2>,
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Request a player entity and a world snapshot.
    Connect,
    /// A key changed state.
    KeyboardInput {
        /// Platform key code.
        key_code: i32,
        /// `true` on press, `false` on release.
        pressed: bool,
    },
    /// A shot aimed at `aim` (map coordinates) with client-traced hits.
    GunShot {
        /// Aim point in map coordinates.
        aim: Vec2,
        /// Bodies the client's trace crossed.
        hits: Vec<ShotHit>,
    },
    /// The mouse moved to this map position.
    MousePosition(Vec2),
}

impl ClientMessage {
    /// Tag written ahead of this message.
    pub fn tag(&self) -> ClientMessageTag {
        match self {
            Self::Connect => ClientMessageTag::Connect,
            Self::KeyboardInput { .. } => ClientMessageTag::KeyboardInput,
            Self::GunShot { .. } => ClientMessageTag::GunShotInfo,
            Self::MousePosition(_) => ClientMessageTag::MousePosition,
        }
    }

    /// Append the tagged message to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.tag() as i32);
        match self {
            Self::Connect => {}
            Self::KeyboardInput { key_code, pressed } => {
                buf.put_i32(*key_code);
                buf.put_bool(*pressed);
            }
            Self::GunShot { aim, hits } => {
                buf.put_vec2(*aim);
                buf.put_count(hits.len());
                for hit in hits {
                    buf.put_i32(hit.entity_id);
                    buf.put_count(hit.points.len());
                    for point in &hit.points {
                        buf.put_vec2(*point);
                    }
                }
            }
            Self::MousePosition(position) => buf.put_vec2(*position),
        }
    }
}

impl WireDecode for ClientMessage {
    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        let tag = ClientMessageTag::try_from(buf.read_int()?)?;
        Ok(match tag {
            ClientMessageTag::Connect => Self::Connect,
            ClientMessageTag::KeyboardInput => Self::KeyboardInput {
                key_code: buf.read_int()?,
                pressed: buf.read_bool()?,
            },
            ClientMessageTag::GunShotInfo => {
                let aim = buf.read_vec2()?;
                let count = buf.read_count()?;
                let mut hits = Vec::with_capacity(capacity_hint(count));
                for _ in 0..count {
                    let entity_id = buf.read_int()?;
                    let point_count = buf.read_count()?;
                    let mut points = Vec::with_capacity(capacity_hint(point_count));
                    for _ in 0..point_count {
                        points.push(buf.read_vec2()?);
                    }
                    hits.push(ShotHit { entity_id, points });
                }
                Self::GunShot { aim, hits }
            }
            ClientMessageTag::MousePosition => Self::MousePosition(buf.read_vec2()?),
        })
    }
}
