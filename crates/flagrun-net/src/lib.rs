//! Networking for flagrun: wire codec, message tags, stream reading, and TCP
//! connection management.
//!
//! Every message is a 4-byte big-endian tag followed by a tag-specific body.
//! There is no outer length prefix, so readers parse incrementally from a
//! buffer and wait for more bytes when a message is incomplete.

pub mod codec;
pub mod framing;
pub mod messages;
pub mod platform;
pub mod tcp_client;
pub mod tcp_server;

pub use codec::{DecodeError, WireDecode, WireRead, WireWrite};
pub use framing::{FrameConfig, MessageReader, ReadError, write_message};
pub use messages::{ClientMessage, ClientMessageTag, ServerMessageTag, ShotHit};
pub use platform::{Keepalive, SocketConfig, configure_stream, create_listener, resolve_address};
pub use tcp_client::{ConnectionState, ConnectionStateWatch, GameClient};
pub use tcp_server::{
    ConnectionClosed, ConnectionEvent, ConnectionId, GameServer, Outbound, ServerConfig,
};
