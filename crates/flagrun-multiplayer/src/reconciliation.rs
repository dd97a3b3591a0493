//! Client-side reconciliation of replicated motion.
//!
//! Each moveable entity on the client owns a [`MotionReconciler`] that
//! buffers [`VelocitySnapshot`]s as they arrive and consumes them once per
//! frame:
//!
//! - **Predicted** entities (the local player) already moved locally when
//!   input was pressed. Each snapshot is used once: the server's current
//!   position is re-derived from it with the movement stepper and compared
//!   to the local one. Large errors snap, small ones become an offset that
//!   is applied on the next local velocity change.
//! - **Non-predicted** entities replay snapshots on a fixed delay. A
//!   snapshot becomes active once it is old enough, and stays active until
//!   the entity reaches the start of the next one (its goal).
//!
//! A queue that grows past its cap is flushed: the newest snapshot is
//! applied directly and everything before it is discarded.

use std::collections::VecDeque;

use glam::Vec2;

use crate::velocity::VelocitySnapshot;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Playback delay for non-predicted entities, in milliseconds.
pub const NET_MOVEMENT_DELAY_MS: i64 = 300;

/// Position error at or above which a predicted entity snaps.
pub const PREDICTION_ERROR_THRESHOLD: f32 = 30.0;

/// Queue length above which pending snapshots are flushed.
pub const MAX_PENDING_SNAPSHOTS: usize = 10;

/// Distance under which a playback goal counts as reached.
pub const GOAL_DISTANCE_THRESHOLD: f32 = 1.0;

// ---------------------------------------------------------------------------
// Config / state
// ---------------------------------------------------------------------------

/// Tunables for [`MotionReconciler`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcilerConfig {
    /// Playback delay for non-predicted entities.
    pub movement_delay_ms: i64,
    /// Snap threshold for predicted entities.
    pub prediction_error_threshold: f32,
    /// Queue cap before a flush.
    pub max_pending: usize,
    /// Goal proximity for non-predicted playback.
    pub goal_distance_threshold: f32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            movement_delay_ms: NET_MOVEMENT_DELAY_MS,
            prediction_error_threshold: PREDICTION_ERROR_THRESHOLD,
            max_pending: MAX_PENDING_SNAPSHOTS,
            goal_distance_threshold: GOAL_DISTANCE_THRESHOLD,
        }
    }
}

/// Where a reconciler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Nothing queued, nothing playing.
    Idle,
    /// A snapshot is queued but not yet active.
    Armed,
    /// A snapshot is being played back or compared.
    Active,
}

/// Locally simulated motion of one entity, as seen by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    /// Current position.
    pub position: Vec2,
    /// Current velocity.
    pub velocity: Vec2,
    /// Local velocity sequence (predicted entities only).
    pub sequence: i32,
    /// Pending correction applied on the next local velocity change.
    pub prediction_error: Option<Vec2>,
}

/// What one [`MotionReconciler::update`] call did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileOutcome {
    /// Nothing to do.
    Idle,
    /// The queue was discarded and the newest snapshot hard-applied.
    Flushed,
    /// A snapshot is queued but too recent to play.
    Waiting,
    /// A snapshot became active and was applied to velocity and position.
    Initiated,
    /// The active snapshot keeps playing.
    Playing,
    /// The predicted position was far off and snapped to the server's.
    Snapped {
        /// Server position the entity moved to.
        to: Vec2,
    },
    /// The predicted position was close; the difference is stored.
    Offset(Vec2),
    /// The snapshot predates local input and was skipped.
    Stale,
    /// Playback finished with nothing queued.
    Finished,
}

// ---------------------------------------------------------------------------
// MotionReconciler
// ---------------------------------------------------------------------------

/// Per-entity snapshot queue and playback state machine.
#[derive(Debug, Clone, Default)]
pub struct MotionReconciler {
    pending: VecDeque<VelocitySnapshot>,
    active: Option<VelocitySnapshot>,
    /// Sequence of the newest snapshot received, until playback finishes.
    last_received: Option<i32>,
}

impl MotionReconciler {
    /// Empty, idle reconciler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> MotionState {
        if self.active.is_some() {
            MotionState::Active
        } else if self.pending.is_empty() {
            MotionState::Idle
        } else {
            MotionState::Armed
        }
    }

    /// Number of queued, not yet active snapshots.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The snapshot being played or compared.
    pub fn active(&self) -> Option<&VelocitySnapshot> {
        self.active.as_ref()
    }

    /// Queue a snapshot that just arrived from the server.
    ///
    /// A snapshot at rest is its own goal. The previously received snapshot,
    /// if it has no goal yet, gets this one's start as its goal.
    pub fn receive(&mut self, mut snapshot: VelocitySnapshot, movement_delay_ms: i64) {
        if snapshot.is_at_rest() {
            snapshot.goal = Some(snapshot.start);
            snapshot.goal_deadline = snapshot.set_at + movement_delay_ms;
        }

        if let Some(previous) = self.last_received_mut() {
            if previous.goal.is_none() {
                previous.goal = Some(snapshot.start);
                previous.goal_deadline = snapshot.set_at + movement_delay_ms;
            }
        }

        self.last_received = Some(snapshot.sequence);
        self.pending.push_back(snapshot);
    }

    /// Advance the state machine by one frame.
    ///
    /// `simulate(start, velocity, elapsed_ms)` must run the movement stepper
    /// for this entity against the current world.
    pub fn update<F>(
        &mut self,
        config: &ReconcilerConfig,
        now: i64,
        entity_active: bool,
        predicted: bool,
        kinematics: &mut Kinematics,
        simulate: F,
    ) -> ReconcileOutcome
    where
        F: FnOnce(Vec2, Vec2, f32) -> Vec2,
    {
        if !entity_active || self.pending.len() > config.max_pending {
            return self.flush(predicted, kinematics);
        }

        let mut outcome = ReconcileOutcome::Idle;

        if self.active.is_none() && !self.pending.is_empty() {
            if predicted {
                self.active = self.pending.pop_front();
            } else {
                let ready = self
                    .pending
                    .front()
                    .is_some_and(|next| now - next.set_at > config.movement_delay_ms);
                if !ready {
                    return ReconcileOutcome::Waiting;
                }
                self.active = self.pending.pop_front();
                self.initiate(kinematics);
                outcome = ReconcileOutcome::Initiated;
            }
        }

        let Some(active) = self.active else {
            return outcome;
        };

        if predicted {
            let outcome = if active.sequence >= kinematics.sequence {
                let elapsed = (now - active.set_at) as f32;
                let server_position = simulate(active.start, active.velocity, elapsed);
                let difference = server_position - kinematics.position;
                if difference.length() >= config.prediction_error_threshold {
                    tracing::debug!(
                        "Prediction error {:.1} at or above threshold, snapping",
                        difference.length()
                    );
                    kinematics.position = server_position;
                    ReconcileOutcome::Snapped {
                        to: server_position,
                    }
                } else {
                    kinematics.prediction_error = Some(difference);
                    ReconcileOutcome::Offset(difference)
                }
            } else {
                ReconcileOutcome::Stale
            };
            self.active = self.pending.pop_front();
            return outcome;
        }

        if !goal_reached(&active, kinematics, now, config.goal_distance_threshold) {
            return if outcome == ReconcileOutcome::Idle {
                ReconcileOutcome::Playing
            } else {
                outcome
            };
        }

        match self.pending.pop_front() {
            Some(next) => {
                self.active = Some(next);
                self.initiate(kinematics);
                ReconcileOutcome::Initiated
            }
            None => {
                self.active = None;
                self.last_received = None;
                ReconcileOutcome::Finished
            }
        }
    }

    /// Drop everything; hard-apply the newest queued snapshot, if any.
    fn flush(&mut self, predicted: bool, kinematics: &mut Kinematics) -> ReconcileOutcome {
        self.active = None;
        let Some(last) = self.pending.drain(..).last() else {
            return ReconcileOutcome::Idle;
        };

        kinematics.velocity = last.velocity;
        kinematics.position = last.start;
        if predicted {
            kinematics.sequence = last.sequence;
            kinematics.prediction_error = None;
        }
        ReconcileOutcome::Flushed
    }

    fn initiate(&self, kinematics: &mut Kinematics) {
        if let Some(active) = &self.active {
            kinematics.velocity = active.velocity;
            kinematics.position = active.start;
        }
    }

    fn last_received_mut(&mut self) -> Option<&mut VelocitySnapshot> {
        let sequence = self.last_received?;
        if let Some(back) = self.pending.back_mut() {
            return (back.sequence == sequence).then_some(back);
        }
        self.active
            .as_mut()
            .filter(|active| active.sequence == sequence)
    }
}

/// Whether playback of `active` should stop.
///
/// True once the deadline passed, the entity is at (or within the distance
/// threshold of) the goal, either vector is zero, or the velocity points
/// away from the goal on either axis.
pub fn goal_reached(
    active: &VelocitySnapshot,
    kinematics: &Kinematics,
    now: i64,
    distance_threshold: f32,
) -> bool {
    let Some(goal) = active.goal else {
        return false;
    };
    let direction = goal - kinematics.position;
    let velocity = kinematics.velocity;

    now > active.goal_deadline
        || direction.length() == 0.0
        || velocity.length() == 0.0
        || direction.length() < distance_threshold
        || (direction.x > 0.0 && velocity.x <= 0.0)
        || (direction.x <= 0.0 && velocity.x > 0.0)
        || (direction.y > 0.0 && velocity.y <= 0.0)
        || (direction.y <= 0.0 && velocity.y > 0.0)
}

#[cfg(test)]
#[path = "reconciliation_tests.rs"]
mod tests;
