//! Movement keys and the velocity they produce.

use glam::Vec2;

/// Key code for moving up (+y).
pub const KEY_W: i32 = 17;
/// Key code for moving left (-x).
pub const KEY_A: i32 = 30;
/// Key code for moving down (-y).
pub const KEY_S: i32 = 31;
/// Key code for moving right (+x).
pub const KEY_D: i32 = 32;

/// Which movement keys are held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    up: bool,
    left: bool,
    down: bool,
    right: bool,
}

impl KeyState {
    /// Record a key event. Returns `false` for keys that do not move.
    pub fn apply(&mut self, key_code: i32, pressed: bool) -> bool {
        let slot = match key_code {
            KEY_W => &mut self.up,
            KEY_A => &mut self.left,
            KEY_S => &mut self.down,
            KEY_D => &mut self.right,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    /// Velocity for the held keys at `speed`. Opposite keys cancel.
    pub fn velocity(&self, speed: f32) -> Vec2 {
        let mut velocity = Vec2::ZERO;
        if self.left {
            velocity.x -= speed;
        }
        if self.right {
            velocity.x += speed;
        }
        if self.up {
            velocity.y += speed;
        }
        if self.down {
            velocity.y -= speed;
        }
        velocity
    }

    /// Release every key.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
