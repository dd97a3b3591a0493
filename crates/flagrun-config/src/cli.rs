//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// flagrun command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "flagrun", about = "Authoritative flagrun game server")]
pub struct CliArgs {
    /// Address to bind (server) or connect to (client).
    #[arg(long)]
    pub address: Option<String>,

    /// TCP port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Milliseconds between server ticks.
    #[arg(long)]
    pub tick_interval_ms: Option<u64>,

    /// RON map description to load instead of the built-in arena.
    #[arg(long)]
    pub map: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref addr) = args.address {
            self.network.server_address = addr.clone();
        }
        if let Some(port) = args.port {
            self.network.server_port = port;
        }
        if let Some(interval) = args.tick_interval_ms {
            self.network.tick_interval_ms = interval;
        }
        if let Some(ref map) = args.map {
            self.server.map_path = Some(map.clone());
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            port: Some(6000),
            map: Some(PathBuf::from("arena.ron")),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.network.server_port, 6000);
        assert_eq!(config.server.map_path, Some(PathBuf::from("arena.ron")));
        // Non-overridden fields retain defaults
        assert_eq!(config.network.server_address, "127.0.0.1");
        assert_eq!(config.network.tick_interval_ms, 17);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from([
            "flagrun-server",
            "--address",
            "0.0.0.0",
            "--tick-interval-ms",
            "33",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.address.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.tick_interval_ms, Some(33));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.port.is_none());
    }
}
