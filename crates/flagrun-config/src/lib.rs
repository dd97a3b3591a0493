//! Configuration for the flagrun server and client.
//!
//! Settings persist to disk as `config.ron`, missing sections fall back to
//! defaults, and command-line flags override whatever was loaded.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME, Config, DebugConfig, NetworkConfig, ReplicationConfig, ServerConfig,
};
pub use error::ConfigError;
