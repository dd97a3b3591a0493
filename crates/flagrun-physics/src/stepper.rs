//! Time-sliced, axis-separated movement.

use glam::Vec2;

use crate::body::{Body, intersects};

/// Milliseconds that make up one unit of velocity.
///
/// A velocity of `v` moves a body `v * elapsed_ms / TIME_SCALE` units.
pub const TIME_SCALE: f32 = 15.0;

/// Largest per-axis movement in a single sub-step.
///
/// Thin obstacles are at least this wide, so a sub-step cannot jump over one.
pub const MAX_MOVEMENT_STEP: f32 = 3.0;

/// A touch between a moving body and a touchable body it overlapped.
///
/// Both sides are notified; the pair is recorded once per sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Touch {
    /// The body that was moving.
    pub mover: i32,
    /// The touchable body it overlapped.
    pub other: i32,
}

/// Deterministic movement stepper.
#[derive(Debug, Clone, Copy)]
pub struct MovementStepper {
    /// Milliseconds per velocity unit.
    pub time_scale: f32,
    /// Per-axis sub-step bound.
    pub max_step: f32,
}

impl Default for MovementStepper {
    fn default() -> Self {
        Self {
            time_scale: TIME_SCALE,
            max_step: MAX_MOVEMENT_STEP,
        }
    }
}

impl MovementStepper {
    /// Position of `mover` after travelling from `start` at `velocity` for
    /// `elapsed_ms`, blocked by solid entries of `others`.
    ///
    /// `others` may contain `mover` itself; it is skipped by id.
    pub fn simulate(
        &self,
        mover: &Body,
        start: Vec2,
        velocity: Vec2,
        elapsed_ms: f32,
        others: &[Body],
    ) -> Vec2 {
        self.step(mover, start, velocity, elapsed_ms, others, None)
    }

    /// Like [`simulate`](Self::simulate) but also records every touch with a
    /// touchable body into `touches`.
    pub fn simulate_with_touches(
        &self,
        mover: &Body,
        start: Vec2,
        velocity: Vec2,
        elapsed_ms: f32,
        others: &[Body],
        touches: &mut Vec<Touch>,
    ) -> Vec2 {
        self.step(mover, start, velocity, elapsed_ms, others, Some(touches))
    }

    fn step(
        &self,
        mover: &Body,
        start: Vec2,
        velocity: Vec2,
        elapsed_ms: f32,
        others: &[Body],
        mut touches: Option<&mut Vec<Touch>>,
    ) -> Vec2 {
        if velocity == Vec2::ZERO {
            return start;
        }

        let mut remaining = velocity * (elapsed_ms / self.time_scale);
        if !remaining.is_finite() || elapsed_ms <= 0.0 {
            if !remaining.is_finite() {
                tracing::warn!(id = mover.id, ?velocity, elapsed_ms, "non-finite movement ignored");
            }
            return start;
        }

        // Counted up front: a large enough f32 remainder no longer shrinks by a sub-step.
        let steps = (remaining.abs().max_element() / self.max_step).ceil() as u64;
        let mut position = start;

        for _ in 0..steps {
            if remaining == Vec2::ZERO {
                break;
            }

            let dx = remaining.x.clamp(-self.max_step, self.max_step);
            let dy = remaining.y.clamp(-self.max_step, self.max_step);

            let probe_x = position + Vec2::new(dx, 0.0);
            let probe_y = position + Vec2::new(0.0, dy);

            let mut move_x = true;
            let mut move_y = true;

            for other in others {
                if other.id == mover.id {
                    continue;
                }

                let hit_x = intersects(probe_x, mover.size, other.position, other.size);
                let hit_y = intersects(probe_y, mover.size, other.position, other.size);
                if !hit_x && !hit_y {
                    continue;
                }

                if other.touchable {
                    if let Some(touches) = touches.as_deref_mut() {
                        touches.push(Touch {
                            mover: mover.id,
                            other: other.id,
                        });
                    }
                }

                if mover.blocks(other) {
                    move_x &= !hit_x;
                    move_y &= !hit_y;
                    if !move_x && !move_y {
                        break;
                    }
                }
            }

            match (move_x, move_y) {
                (true, true) => position += Vec2::new(dx, dy),
                (true, false) => position.x += dx,
                (false, true) => position.y += dy,
                (false, false) => return position,
            }

            remaining -= Vec2::new(dx, dy);
        }

        position
    }
}

#[cfg(test)]
#[path = "stepper_tests.rs"]
mod tests;
