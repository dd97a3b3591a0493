//! A world: entities, teams, background and the movement stepper that
//! advances them.

use flagrun_physics::{Body, MovementStepper, TraceHit, Touch, trace_segment};
use glam::Vec2;

use crate::entity::Entity;
use crate::field::Role;
use crate::ids::EntityId;
use crate::reconciliation::{ReconcileOutcome, ReconcilerConfig};
use crate::registry::EntityRegistry;
use crate::team::Teams;

/// Background texture used until a map sets one.
pub const DEFAULT_BACKGROUND: &str = "grass";

/// Entities and teams of one side of the connection.
#[derive(Debug)]
pub struct World {
    role: Role,
    /// Live entities.
    pub registry: EntityRegistry,
    /// Teams and their rosters.
    pub teams: Teams,
    background: String,
    stepper: MovementStepper,
}

impl World {
    /// Empty world for `role`.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            registry: EntityRegistry::new(),
            teams: Teams::new(),
            background: DEFAULT_BACKGROUND.to_owned(),
            stepper: MovementStepper::default(),
        }
    }

    /// Side this world lives on.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Background texture name.
    pub fn background(&self) -> &str {
        &self.background
    }

    /// Replace the background texture name.
    pub fn set_background(&mut self, texture: impl Into<String>) {
        self.background = texture.into();
    }

    /// Stepper shared by physics and reconciliation.
    pub fn stepper(&self) -> &MovementStepper {
        &self.stepper
    }

    /// Entity with `id`.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.registry.lookup(id)
    }

    /// Mutable entity with `id`.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.registry.lookup_mut(id)
    }

    /// Move every active moveable entity by its velocity for `elapsed_ms`.
    ///
    /// Entities move one after another in registration order, each against
    /// the already-updated positions of the ones before it. Positions are set
    /// locally; motion reaches clients through velocity snapshots. When
    /// `touches` is given, every touch is appended to it.
    pub fn physics_step(&mut self, elapsed_ms: f32, mut touches: Option<&mut Vec<Touch>>) {
        let mut bodies = self.registry.bodies();
        for slot in 0..bodies.len() {
            let mover = bodies[slot];
            let Some(entity) = self.registry.lookup_mut(EntityId(mover.id)) else {
                continue;
            };
            if !entity.is_moveable() {
                continue;
            }

            let velocity = entity.velocity();
            let next = match touches.as_deref_mut() {
                Some(touches) => self.stepper.simulate_with_touches(
                    &mover,
                    mover.position,
                    velocity,
                    elapsed_ms,
                    &bodies,
                    touches,
                ),
                None => self
                    .stepper
                    .simulate(&mover, mover.position, velocity, elapsed_ms, &bodies),
            };

            if next != mover.position {
                entity.set_local_position(next);
                bodies[slot].position = next;
            }
        }
    }

    /// Run every moveable entity's reconciler once at server time `now`.
    ///
    /// Returns the outcome for every entity that did something.
    pub fn reconcile_motion(
        &mut self,
        config: &ReconcilerConfig,
        now: i64,
    ) -> Vec<(EntityId, ReconcileOutcome)> {
        let bodies = self.registry.bodies();
        let stepper = self.stepper;
        let mut outcomes = Vec::new();

        for entity in self.registry.iter_mut() {
            if !entity.is_moveable() {
                continue;
            }
            let mover = entity.body();
            let outcome = entity.reconcile(config, now, |start, velocity, elapsed| {
                stepper.simulate(&mover, start, velocity, elapsed, &bodies)
            });
            if outcome != ReconcileOutcome::Idle {
                outcomes.push((entity.id(), outcome));
            }
        }
        outcomes
    }

    /// Solid bodies crossed by a segment, skipping entity `ignore`.
    pub fn trace(&self, origin: Vec2, direction: Vec2, ignore: EntityId) -> Vec<TraceHit> {
        trace_segment(origin, direction, &self.registry.bodies(), ignore.0)
    }

    /// Collision bodies of every active entity.
    pub fn bodies(&self) -> Vec<Body> {
        self.registry.bodies()
    }
}
