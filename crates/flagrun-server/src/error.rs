//! Server startup and runtime errors.

use flagrun_config::ConfigError;
use flagrun_multiplayer::MapError;

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The map file could not be loaded.
    #[error(transparent)]
    Map(#[from] MapError),

    /// The configured address is not `ip:port`.
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),

    /// Binding or accepting failed.
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
}
