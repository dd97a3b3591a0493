//! A live connection to a flagrun server.
//!
//! [`ClientSession::connect`] opens the socket, sends the connect request
//! and spawns a task that decodes server messages and applies them to the
//! shared [`ClientWorld`]. The host drives frames with
//! [`ClientSession::update`] and feeds local input through the session, which
//! predicts locally and forwards it to the server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use flagrun_config::Config;
use flagrun_multiplayer::{EntityId, ReconcileOutcome, ServerMessage};
use flagrun_net::{
    ClientMessage, ConnectionState, ConnectionStateWatch, GameClient, MessageReader, ReadError,
    SocketConfig, resolve_address,
};
use glam::Vec2;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client_world::{ClientWorld, reconciler_config};
use crate::error::ClientError;
use crate::receiver::ReplicationReceiver;

/// Lock the shared world, recovering it if a holder panicked.
pub fn lock_world(world: &Mutex<ClientWorld>) -> MutexGuard<'_, ClientWorld> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Client side of one server connection.
pub struct ClientSession {
    client: GameClient,
    world: Arc<Mutex<ClientWorld>>,
    receive_task: JoinHandle<()>,
    mouse_interval: Duration,
    last_mouse: Option<Instant>,
}

impl ClientSession {
    /// Connect to the server named in `config` and request to join.
    pub async fn connect(config: &Config) -> Result<Self, ClientError> {
        let addr = resolve_address(&config.network.server_address, config.network.server_port)
            .await?;
        Self::connect_to(addr, config).await
    }

    /// Connect to `addr` using the remaining settings of `config`.
    pub async fn connect_to(addr: SocketAddr, config: &Config) -> Result<Self, ClientError> {
        let socket = SocketConfig {
            tcp_nodelay: config.network.tcp_nodelay,
            ..SocketConfig::default()
        };
        let (client, reader) = GameClient::connect(addr, &socket).await?;

        let world = Arc::new(Mutex::new(ClientWorld::new(
            reconciler_config(&config.replication),
            config.replication.prediction_enabled,
        )));
        let receive_task = tokio::spawn(receive_loop(
            reader,
            Arc::clone(&world),
            Arc::clone(client.state()),
            client.shutdown_signal(),
        ));

        client.send(&ClientMessage::Connect).await?;

        Ok(Self {
            client,
            world,
            receive_task,
            mouse_interval: Duration::from_millis(config.network.mouse_send_interval_ms),
            last_mouse: None,
        })
    }

    /// The shared mirror.
    pub fn world(&self) -> &Arc<Mutex<ClientWorld>> {
        &self.world
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.client.state().current()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.client.state().subscribe()
    }

    /// Id of the controlled entity, once assigned.
    pub fn local_player_id(&self) -> Option<EntityId> {
        lock_world(&self.world).local_player_id()
    }

    /// Advance the mirror by one frame.
    pub fn update(&self) -> Option<Vec<(EntityId, ReconcileOutcome)>> {
        let mut world = lock_world(&self.world);
        let now = world.clock.now();
        world.update_at(now)
    }

    /// Predict a key change locally and send it.
    pub async fn key_event(&self, key_code: i32, pressed: bool) -> Result<(), ClientError> {
        let message = {
            let mut world = lock_world(&self.world);
            let now = world.clock.now();
            world.key_event(key_code, pressed, now)
        };
        self.send(&message).await
    }

    /// Send the mouse position, at most once per configured interval.
    ///
    /// Returns whether a message was sent.
    pub async fn mouse_moved(&mut self, position: Vec2) -> Result<bool, ClientError> {
        let now = Instant::now();
        if self
            .last_mouse
            .is_some_and(|last| now.duration_since(last) < self.mouse_interval)
        {
            return Ok(false);
        }
        self.last_mouse = Some(now);
        self.send(&ClientMessage::MousePosition(position)).await?;
        Ok(true)
    }

    /// Trace a shot towards `aim` and send it with its hits.
    pub async fn fire(&self, aim: Vec2) -> Result<(), ClientError> {
        let message = lock_world(&self.world).fire(aim);
        match message {
            Some(message) => self.send(&message).await,
            None => Ok(()),
        }
    }

    /// Close the connection and stop the receive task.
    pub async fn disconnect(self) {
        self.client.disconnect().await;
        if let Err(e) = self.receive_task.await {
            tracing::warn!("Receive task ended abnormally: {e}");
        }
    }

    async fn send(&self, message: &ClientMessage) -> Result<(), ClientError> {
        if matches!(
            self.state(),
            ConnectionState::Disconnected | ConnectionState::Failed
        ) {
            return Err(ClientError::NotConnected);
        }
        self.client.send(message).await?;
        Ok(())
    }
}

/// Decode server messages until the stream ends or shutdown is signalled.
async fn receive_loop<R>(
    mut reader: MessageReader<R>,
    world: Arc<Mutex<ClientWorld>>,
    state: Arc<ConnectionStateWatch>,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let receiver = ReplicationReceiver;
    loop {
        let message = tokio::select! {
            message = reader.read::<ServerMessage>() => message,
            _ = shutdown.changed() => {
                tracing::debug!("Receive task stopping");
                return;
            }
        };

        match message {
            Ok(message) => {
                let mut world = lock_world(&world);
                receiver.apply_logged(&mut world, message);
            }
            Err(ReadError::Closed) => {
                tracing::info!("Server closed the connection");
                state.finish(ConnectionState::Disconnected);
                return;
            }
            Err(e) => {
                tracing::warn!("Connection to server failed: {e}");
                state.finish(ConnectionState::Failed);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};
    use flagrun_multiplayer::messages::{write_background, write_player_id, write_server_time};
    use flagrun_net::WireDecode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    async fn pair() -> (ClientSession, tokio::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let session = ClientSession::connect_to(addr, &Config::default())
            .await
            .unwrap();
        (session, accept.await.unwrap())
    }

    async fn read_client_message(stream: &mut tokio::net::TcpStream, len: usize) -> ClientMessage {
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await.unwrap();
        let mut cursor: &[u8] = &buf;
        ClientMessage::decode(&mut cursor).unwrap()
    }

    #[tokio::test]
    async fn test_connect_sends_connect_request() {
        let (_session, mut server) = pair().await;
        assert_eq!(read_client_message(&mut server, 4).await, ClientMessage::Connect);
    }

    #[tokio::test]
    async fn test_received_messages_reach_world() {
        let (session, mut server) = pair().await;
        read_client_message(&mut server, 4).await;

        let mut buf = BytesMut::new();
        write_background(&mut buf, "sand");
        write_server_time(&mut buf, 90_000);
        write_player_id(&mut buf, EntityId(4));
        server.write_all(&buf).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while session.local_player_id().is_none() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let world = lock_world(session.world());
        assert_eq!(world.local_player_id(), Some(EntityId(4)));
        assert_eq!(world.world.background(), "sand");
        assert!(world.clock.now() >= 90_000);
    }

    #[tokio::test]
    async fn test_mouse_messages_are_throttled() {
        let (mut session, mut server) = pair().await;
        session.mouse_interval = Duration::from_secs(60);
        read_client_message(&mut server, 4).await;

        assert!(session.mouse_moved(Vec2::new(1.0, 2.0)).await.unwrap());
        assert!(!session.mouse_moved(Vec2::new(3.0, 4.0)).await.unwrap());
        assert_eq!(
            read_client_message(&mut server, 12).await,
            ClientMessage::MousePosition(Vec2::new(1.0, 2.0))
        );
    }

    #[tokio::test]
    async fn test_server_close_disconnects() {
        let (session, server) = pair().await;
        let mut state = session.subscribe();
        drop(server);

        tokio::time::timeout(Duration::from_secs(2), async {
            while !matches!(
                *state.borrow_and_update(),
                ConnectionState::Disconnected | ConnectionState::Failed
            ) {
                state.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert!(matches!(
            session.key_event(0, true).await,
            Err(ClientError::NotConnected)
        ));
    }

    async fn wait_until_ended(session: &ClientSession) {
        let mut state = session.subscribe();
        tokio::time::timeout(Duration::from_secs(2), async {
            while matches!(
                *state.borrow_and_update(),
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                state.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_tag_fails_session() {
        let (session, mut server) = pair().await;
        read_client_message(&mut server, 4).await;

        server.write_all(&[0, 0, 0, 99]).await.unwrap();

        wait_until_ended(&session).await;
        assert_eq!(session.state(), ConnectionState::Failed);
        assert!(matches!(
            session.key_event(0, true).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_unknown_entity_type_fails_session() {
        let (session, mut server) = pair().await;
        read_client_message(&mut server, 4).await;

        let mut buf = BytesMut::new();
        buf.put_i32(0);
        buf.put_i32(1);
        buf.put_i32(6);
        buf.put_slice(b"Dragon");
        buf.put_i32(3);
        server.write_all(&buf).await.unwrap();

        wait_until_ended(&session).await;
        assert_eq!(session.state(), ConnectionState::Failed);
        assert!(lock_world(session.world()).world.registry.is_empty());
        assert!(matches!(
            session.key_event(0, true).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_stops_receive_task() {
        let (session, _server) = pair().await;
        session.disconnect().await;
    }
}
