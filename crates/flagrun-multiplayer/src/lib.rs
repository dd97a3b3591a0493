//! Replicated game state shared by the flagrun server and client.
//!
//! The server owns the authoritative [`World`]; every change it makes to a
//! [`ReplicatedField`] is queued for broadcast. Clients hold a mirror built
//! from decoded [`ServerMessage`]s and smooth out moveable entities with a
//! per-entity [`MotionReconciler`].

pub mod clock;
pub mod entity;
pub mod error;
pub mod field;
pub mod ids;
pub mod input;
pub mod kinds;
pub mod map;
pub mod messages;
pub mod reconciliation;
pub mod registry;
pub mod team;
pub mod velocity;
pub mod world;

pub use clock::{ClientClock, ServerClock, wall_millis};
pub use entity::{Entity, EntityKind, EntityType, Motion};
pub use error::ApplyError;
pub use field::{ErasedField, FieldId, FieldIdAllocator, FieldValue, Outbox, ReplicatedField, Role};
pub use ids::{EntityId, TeamId};
pub use input::KeyState;
pub use kinds::{Block, Flag, Player, PlayerClass, orientation_degrees};
pub use map::{EntityDescription, MapDescription, MapError, TeamDescription};
pub use messages::ServerMessage;
pub use reconciliation::{
    MotionReconciler, MotionState, ReconcileOutcome, ReconcilerConfig, goal_reached,
};
pub use registry::EntityRegistry;
pub use team::{Team, TeamRecord, Teams};
pub use velocity::VelocitySnapshot;
pub use world::World;
