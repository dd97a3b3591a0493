//! Entity and team identifiers.

use std::fmt;

/// Server-assigned entity identifier. `-1` on the wire means "no entity".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub i32);

impl EntityId {
    /// Wire value for an absent entity reference.
    pub const NONE: i32 = -1;

    /// Decode a wire reference; negative values mean "none".
    pub fn from_wire(raw: i32) -> Option<Self> {
        (raw >= 0).then_some(Self(raw))
    }

    /// Encode an optional reference.
    pub fn to_wire(id: Option<Self>) -> i32 {
        id.map_or(Self::NONE, |id| id.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Team identifier, unique within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamId(pub i32);

impl TeamId {
    /// Decode a wire reference; negative values mean "none".
    pub fn from_wire(raw: i32) -> Option<Self> {
        (raw >= 0).then_some(Self(raw))
    }

    /// Encode an optional reference.
    pub fn to_wire(id: Option<Self>) -> i32 {
        id.map_or(-1, |id| id.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {}", self.0)
    }
}
