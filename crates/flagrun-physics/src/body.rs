//! Collision bodies.

use glam::Vec2;

/// Coarse body category used for collision carve-outs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyClass {
    /// A player avatar. Two players never block each other.
    Player,
    /// Any other entity.
    Other,
}

/// Collision view of one entity: centre, extents and flags.
///
/// Bodies are plain copies taken from the registry for the duration of a
/// step, so stepping never borrows the entities themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    /// Entity id this body belongs to.
    pub id: i32,
    /// Centre of the bounding box.
    pub position: Vec2,
    /// Full width and height of the bounding box.
    pub size: Vec2,
    /// Blocks other solid bodies.
    pub solid: bool,
    /// Receives touch events.
    pub touchable: bool,
    /// Category for the player/player carve-out.
    pub class: BodyClass,
}

impl Body {
    /// Whether `self` and `other` stop each other's movement.
    pub fn blocks(&self, other: &Body) -> bool {
        self.solid
            && other.solid
            && !(self.class == BodyClass::Player && other.class == BodyClass::Player)
    }
}

/// Inclusive AABB overlap test on centred boxes.
///
/// Boxes that share an edge count as intersecting.
pub fn intersects(a_pos: Vec2, a_size: Vec2, b_pos: Vec2, b_size: Vec2) -> bool {
    (a_pos.x - b_pos.x).abs() * 2.0 <= a_size.x + b_size.x
        && (a_pos.y - b_pos.y).abs() * 2.0 <= a_size.y + b_size.y
}
