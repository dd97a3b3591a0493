//! Velocity snapshots: the replicated description of a moveable entity's
//! motion.

use bytes::{BufMut, BytesMut};
use flagrun_net::{DecodeError, WireRead, WireWrite};
use glam::Vec2;

use crate::field::FieldValue;

/// Motion set on the server at `set_at`, starting from `start`.
///
/// `goal` and `goal_deadline` are filled in on the client once the next
/// snapshot arrives; they never travel on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocitySnapshot {
    /// Position when the velocity was set.
    pub start: Vec2,
    /// Velocity in units per [`TIME_SCALE`](flagrun_physics::TIME_SCALE) ms.
    pub velocity: Vec2,
    /// Server time in milliseconds when the velocity was set.
    pub set_at: i64,
    /// Per-entity counter, incremented on every server-side change.
    pub sequence: i32,
    /// Where playback of this snapshot should stop.
    pub goal: Option<Vec2>,
    /// Server time after which the goal counts as reached.
    pub goal_deadline: i64,
}

impl VelocitySnapshot {
    /// Snapshot with no goal yet.
    pub fn new(start: Vec2, velocity: Vec2, set_at: i64, sequence: i32) -> Self {
        Self {
            start,
            velocity,
            set_at,
            sequence,
            goal: None,
            goal_deadline: 0,
        }
    }

    /// Whether the snapshot describes an entity at rest.
    pub fn is_at_rest(&self) -> bool {
        self.velocity.length() == 0.0
    }
}

impl FieldValue for VelocitySnapshot {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_vec2(self.start);
        buf.put_vec2(self.velocity);
        buf.put_i64(self.set_at);
        buf.put_i32(self.sequence);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        let start = buf.read_vec2()?;
        let velocity = buf.read_vec2()?;
        let set_at = buf.read_long()?;
        let sequence = buf.read_int()?;
        Ok(Self::new(start, velocity, set_at, sequence))
    }
}
