//! TCP client for connecting to a flagrun server.
//!
//! [`GameClient::connect`] hands back the client together with a
//! [`MessageReader`] over the read half; whoever applies server messages
//! owns the reader, while the client keeps the write half for sending. State
//! changes are broadcast via a [`watch`] channel so any number of consumers
//! can react without polling.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};

use crate::framing::{MessageReader, write_message};
use crate::messages::ClientMessage;
use crate::platform::{SocketConfig, configure_stream};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to establish a TCP connection.
    Connecting,
    /// TCP connection established, ready for communication.
    Connected,
    /// Connection intentionally closed or ended by the peer.
    Disconnected,
    /// The connection broke: a send failed or the stream was malformed.
    Failed,
}

/// Observable connection state backed by a [`watch`] channel.
pub struct ConnectionStateWatch {
    tx: watch::Sender<ConnectionState>,
    rx: watch::Receiver<ConnectionState>,
}

impl Default for ConnectionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateWatch {
    /// Create a new watch initialized to [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx, rx }
    }

    /// Set the current connection state, notifying all subscribers.
    pub fn set(&self, state: ConnectionState) {
        let _ = self.tx.send(state);
    }

    /// Move to `state` unless the connection already ended.
    ///
    /// `Failed` and `Disconnected` are terminal; a late task noticing the
    /// closed socket must not overwrite the reason recorded first.
    pub fn finish(&self, state: ConnectionState) {
        self.tx.send_if_modified(|current| {
            if matches!(
                current,
                ConnectionState::Failed | ConnectionState::Disconnected
            ) {
                return false;
            }
            *current = state;
            true
        });
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.rx.clone()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> ConnectionState {
        *self.rx.borrow()
    }
}

/// Handle to a connected server session.
///
/// Owns the writer half of the TCP stream (behind a mutex so sends from
/// different tasks never interleave), the connection state watch, and a
/// shutdown signal for the task reading server messages.
pub struct GameClient {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    state: Arc<ConnectionStateWatch>,
    /// Sending `true` tells the read task to exit.
    shutdown_tx: watch::Sender<bool>,
}

impl GameClient {
    /// Connect to the server at `addr`.
    ///
    /// Applies `socket` options and splits the stream. Returns immediately
    /// after the TCP handshake; nothing is sent.
    pub async fn connect(
        addr: SocketAddr,
        socket: &SocketConfig,
    ) -> std::io::Result<(Self, MessageReader<OwnedReadHalf>)> {
        let state = Arc::new(ConnectionStateWatch::new());
        state.set(ConnectionState::Connecting);

        let stream = match TcpStream::connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                state.set(ConnectionState::Failed);
                return Err(e);
            }
        };
        configure_stream(&stream, socket)?;
        state.set(ConnectionState::Connected);
        tracing::info!("Connected to {addr}");

        let (reader, writer) = stream.into_split();
        let (shutdown_tx, _) = watch::channel(false);

        let client = Self {
            writer: Arc::new(Mutex::new(writer)),
            state,
            shutdown_tx,
        };
        Ok((client, MessageReader::new(reader)))
    }

    /// Encode and send one message.
    ///
    /// A write failure moves the connection to [`ConnectionState::Failed`].
    pub async fn send(&self, message: &ClientMessage) -> std::io::Result<()> {
        let mut buf = BytesMut::new();
        message.encode(&mut buf);

        let mut writer = self.writer.lock().await;
        if let Err(e) = write_message(&mut *writer, &buf).await {
            tracing::warn!("Send of {:?} failed: {e}", message.tag());
            self.state.finish(ConnectionState::Failed);
            return Err(e);
        }
        Ok(())
    }

    /// Return the connection state watch.
    pub fn state(&self) -> &Arc<ConnectionStateWatch> {
        &self.state
    }

    /// Receiver that flips to `true` when [`disconnect`](Self::disconnect)
    /// is called.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Disconnect from the server.
    ///
    /// Signals the read task to exit, transitions state to
    /// [`ConnectionState::Disconnected`], and shuts down the write half.
    pub async fn disconnect(&self) {
        self.shutdown_tx.send_replace(true);
        self.state.finish(ConnectionState::Disconnected);
        let mut writer = self.writer.lock().await;
        let _ = tokio::io::AsyncWriteExt::shutdown(&mut *writer).await;
    }
}
