//! TCP server: accepts connections and turns each into a stream of events.
//!
//! Every accepted socket gets a read task and a write task. The read task
//! decodes [`ClientMessage`]s and forwards them as [`ConnectionEvent`]s on a
//! single channel; it never touches game state. The write task drains an
//! unbounded queue of encoded messages, so whoever owns the game state can
//! send without awaiting socket IO.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{RwLock, mpsc, watch};

use crate::framing::{MessageReader, ReadError, write_message};
use crate::messages::ClientMessage;
use crate::platform::{SocketConfig, configure_stream, create_listener};

/// Unique identifier for a TCP connection within a server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// Atomic generator for monotonically increasing [`ConnectionId`]s.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique [`ConnectionId`].
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending side of one connection's outbound queue.
///
/// Sending fails once the write task has stopped, which is how a broken
/// connection is noticed by the sender.
#[derive(Debug, Clone)]
pub struct Outbound {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Bytes>,
}

/// The connection's write task has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("connection {0:?} is closed")]
pub struct ConnectionClosed(pub ConnectionId);

impl Outbound {
    /// Queue pre-encoded bytes for this connection.
    pub fn send(&self, bytes: Bytes) -> Result<(), ConnectionClosed> {
        self.tx.send(bytes).map_err(|_| ConnectionClosed(self.id))
    }

    /// Connection this queue writes to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Create a queue not backed by a socket; the receiver sees every send.
    pub fn detached(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }
}

/// What happened on a connection, in arrival order.
///
/// For any one [`ConnectionId`] the sequence is always
///
/// ```text
/// Opened, Message*, Closed
/// ```
///
/// Events from different connections interleave freely. A consumer that
/// applies them in order never sees a message from a connection it has not
/// been told about, and never hears from a connection again after `Closed`.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A socket was accepted. `outbound` writes to it.
    Opened {
        id: ConnectionId,
        peer: SocketAddr,
        outbound: Outbound,
    },
    Message {
        id: ConnectionId,
        message: ClientMessage,
    },
    /// The read loop ended. The write task may still be draining.
    Closed { id: ConnectionId },
}

/// Error returned when the connection map is at capacity.
#[derive(Debug)]
pub struct ConnectionLimitReached;

/// Thread-safe map of open connections keyed by [`ConnectionId`].
pub struct ConnectionMap {
    inner: RwLock<HashMap<ConnectionId, SocketAddr>>,
    max_connections: usize,
}

impl ConnectionMap {
    /// Create a new map with the given capacity limit.
    pub fn new(max_connections: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Insert a connection. Returns `Err` if the map is at capacity.
    pub async fn insert(
        &self,
        id: ConnectionId,
        peer: SocketAddr,
    ) -> Result<(), ConnectionLimitReached> {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_connections {
            return Err(ConnectionLimitReached);
        }
        map.insert(id, peer);
        Ok(())
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, id: &ConnectionId) -> Option<SocketAddr> {
        self.inner.write().await.remove(id)
    }

    /// Return the number of open connections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Configuration for [`GameServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections. Default: 32.
    pub max_connections: usize,
    /// Options applied to each accepted socket.
    pub socket: SocketConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 56500)),
            max_connections: 32,
            socket: SocketConfig::default(),
        }
    }
}

/// TCP server that accepts connections and reports their events.
pub struct GameServer {
    config: ServerConfig,
    /// Open connection map (public for test inspection).
    pub connections: Arc<ConnectionMap>,
    id_gen: Arc<IdGenerator>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GameServer {
    /// Create a server reporting to `events`.
    pub fn new(config: ServerConfig, events: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            connections: Arc::new(ConnectionMap::new(config.max_connections)),
            id_gen: Arc::new(IdGenerator::new()),
            config,
            events,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind to the configured address and run the accept loop.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = create_listener(self.config.bind_addr, &self.config.socket).await?;
        tracing::info!("Server listening on {}", self.config.bind_addr);
        self.run_with_listener(listener).await
    }

    /// Run the accept loop with a pre-bound listener (useful for tests).
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = result?;
                    // Nodelay and keepalive from SocketConfig
                    if let Err(e) = configure_stream(&stream, &self.config.socket) {
                        tracing::warn!("Failed to configure socket from {peer}: {e}");
                        continue;
                    }

                    let id = self.id_gen.next_id();
                    if self.connections.insert(id, peer).await.is_err() {
                        tracing::warn!("Connection limit reached, rejecting {peer}");
                        continue;
                    }

                    tracing::info!("Accepted connection {id:?} from {peer}");
                    self.spawn_connection(id, peer, stream);
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Signal the accept loop and every connection task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Receiver that flips to `true` on [`shutdown`](Self::shutdown).
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    fn spawn_connection(&self, id: ConnectionId, peer: SocketAddr, stream: tokio::net::TcpStream) {
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();

        let outbound = Outbound { id, tx };
        // Opened goes out before the read task exists, so it precedes every Message
        if self
            .events
            .send(ConnectionEvent::Opened { id, peer, outbound })
            .is_err()
        {
            tracing::warn!("Event consumer gone, dropping connection {id:?}");
            return;
        }

        let mut write_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            Self::write_loop(id, writer, rx, &mut write_shutdown).await;
        });

        let events = self.events.clone();
        let connections = Arc::clone(&self.connections);
        let mut read_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            Self::read_loop(id, reader, &events, &mut read_shutdown).await;
            connections.remove(&id).await;
            // Last event for this id
            let _ = events.send(ConnectionEvent::Closed { id });
            tracing::info!("Connection {id:?} closed");
        });
    }

    /// Decode messages until the peer goes away or shutdown is signalled.
    async fn read_loop(
        id: ConnectionId,
        reader: OwnedReadHalf,
        events: &mpsc::UnboundedSender<ConnectionEvent>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        let mut reader = MessageReader::new(reader);
        loop {
            tokio::select! {
                result = reader.read::<ClientMessage>() => {
                    match result {
                        Ok(message) => {
                            tracing::trace!("Connection {id:?} sent {:?}", message.tag());
                            if events.send(ConnectionEvent::Message { id, message }).is_err() {
                                break; // Consumer gone
                            }
                        }
                        Err(ReadError::Closed) => break,
                        // Truncated, oversized or malformed input ends the connection too
                        Err(e) => {
                            tracing::warn!("Connection {id:?} read failed: {e}");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Write queued messages in order; stop at the first failure.
    ///
    /// Returning drops `rx`, after which every [`Outbound::send`] for this
    /// connection fails with [`ConnectionClosed`]. That is the only signal the
    /// game side gets that a write broke.
    async fn write_loop(
        id: ConnectionId,
        mut writer: OwnedWriteHalf,
        mut rx: mpsc::UnboundedReceiver<Bytes>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                next = rx.recv() => {
                    let Some(bytes) = next else { break }; // Every Outbound dropped
                    if let Err(e) = write_message(&mut writer, &bytes).await {
                        tracing::warn!("Connection {id:?} write failed: {e}");
                        break;
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
