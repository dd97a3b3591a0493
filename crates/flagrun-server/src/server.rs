//! The running server: accept loop plus fixed-interval tick task.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use flagrun_config::Config;
use flagrun_multiplayer::{MapDescription, Role, ServerClock, World};
use flagrun_net::{ConnectionEvent, GameServer, ServerConfig, SocketConfig};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::ServerError;
use crate::hooks::GameplayHooks;
use crate::state::ServerState;

/// Lock the shared state, recovering from a panicked holder.
pub fn lock_state(state: &Mutex<ServerState>) -> MutexGuard<'_, ServerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// World described by the configured map, or the built-in arena.
pub fn load_world(config: &Config) -> Result<World, ServerError> {
    let map = match &config.server.map_path {
        Some(path) => MapDescription::load(path)?,
        None => MapDescription::default_arena(),
    };
    let mut world = World::new(Role::Server);
    map.populate(&mut world);
    Ok(world)
}

/// An authoritative flagrun server.
pub struct Server {
    state: Arc<Mutex<ServerState>>,
    network: Arc<GameServer>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    tick_interval: Duration,
    bind_addr: SocketAddr,
    clock: ServerClock,
}

impl Server {
    /// Server over `world` with settings from `config`.
    pub fn new(
        config: &Config,
        world: World,
        hooks: Box<dyn GameplayHooks>,
    ) -> Result<Self, ServerError> {
        let bind_addr: SocketAddr = format!(
            "{}:{}",
            config.network.server_address, config.network.server_port
        )
        .parse()
        .map_err(|_| ServerError::InvalidAddress(config.network.server_address.clone()))?;

        let (events_tx, events) = mpsc::unbounded_channel();
        let network = GameServer::new(
            ServerConfig {
                bind_addr,
                max_connections: config.network.max_connections,
                socket: SocketConfig {
                    tcp_nodelay: config.network.tcp_nodelay,
                    ..SocketConfig::default()
                },
            },
            events_tx,
        );

        Ok(Self {
            state: Arc::new(Mutex::new(ServerState::new(world, hooks))),
            network: Arc::new(network),
            events,
            tick_interval: Duration::from_millis(config.network.tick_interval_ms.max(1)),
            bind_addr,
            clock: ServerClock,
        })
    }

    /// Shared handle to the authoritative state.
    pub fn state(&self) -> Arc<Mutex<ServerState>> {
        Arc::clone(&self.state)
    }

    /// Accept loop handle, for shutdown and connection inspection.
    pub fn network(&self) -> Arc<GameServer> {
        Arc::clone(&self.network)
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener =
            flagrun_net::create_listener(self.bind_addr, &SocketConfig::default()).await?;
        tracing::info!("Server listening on {}", self.bind_addr);
        self.run_with_listener(listener).await
    }

    /// Run with a pre-bound listener until shutdown.
    pub async fn run_with_listener(mut self, listener: TcpListener) -> Result<(), ServerError> {
        let network = Arc::clone(&self.network);
        let accept = tokio::spawn(async move { network.run_with_listener(listener).await });

        let mut shutdown = self.network.shutdown_signal();
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Tick loop stopped");
        match accept.await {
            Ok(result) => result.map_err(ServerError::from),
            Err(e) => {
                tracing::warn!("Accept task ended abnormally: {e}");
                Ok(())
            }
        }
    }

    /// Apply queued connection events and advance one tick.
    fn tick(&mut self) {
        let now = self.clock.now();
        let mut state = lock_state(&self.state);
        while let Ok(event) = self.events.try_recv() {
            state.handle_event(event, now);
        }
        state.tick(now);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flagrun_multiplayer::EntityType;

    use super::*;
    use crate::hooks::NoGameplay;

    #[test]
    fn test_load_world_defaults_to_arena() {
        let world = load_world(&Config::default()).unwrap();
        assert_eq!(world.teams.len(), 2);
        assert!(
            world
                .registry
                .iter()
                .any(|entity| entity.entity_type() == EntityType::Flag)
        );
    }

    #[test]
    fn test_load_world_reads_configured_map() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"(background: "sand", entities: [Boundary(position: (0.0, 0.0), width: 10, height: 10)])"#
        )
        .unwrap();
        let mut config = Config::default();
        config.server.map_path = Some(file.path().to_path_buf());

        let world = load_world(&config).unwrap();
        assert_eq!(world.background(), "sand");
        assert_eq!(world.registry.len(), 1);
        assert!(world.teams.is_empty());
    }

    #[test]
    fn test_missing_map_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.map_path = Some(dir.path().join("absent.ron"));
        assert!(matches!(load_world(&config), Err(ServerError::Map(_))));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let mut config = Config::default();
        config.network.server_address = "not an address".into();
        let result = Server::new(&config, World::new(Role::Server), Box::new(NoGameplay));
        assert!(matches!(result, Err(ServerError::InvalidAddress(_))));
    }
}
