//! Flagrun client: a mirror of the server world kept in sync over TCP.
//!
//! The [`ReplicationReceiver`] applies decoded server messages to a
//! [`ClientWorld`]; [`ClientWorld::update`] steps local physics, reconciles
//! moveable entities against the received velocity snapshots and removes
//! deleted entities. [`ClientSession`] ties both to a live connection.

pub mod client_world;
pub mod error;
pub mod receiver;
pub mod session;

pub use client_world::{ClientWorld, reconciler_config};
pub use error::ClientError;
pub use receiver::ReplicationReceiver;
pub use session::{ClientSession, lock_world};
