//! Authoritative flagrun server.
//!
//! A [`Server`] accepts TCP connections, turns their messages into
//! [`ConnectionEvent`](flagrun_net::ConnectionEvent)s, and runs a fixed
//! interval tick over a [`ServerState`]: apply events, step physics, run the
//! [`GameplayHooks`], broadcast through the [`ReplicationChannel`], sweep.

pub mod channel;
pub mod error;
pub mod hooks;
pub mod server;
pub mod state;

pub use channel::{Connection, ReplicationChannel};
pub use error::ServerError;
pub use hooks::{GameplayHooks, NoGameplay};
pub use server::{Server, load_world, lock_state};
pub use state::ServerState;
