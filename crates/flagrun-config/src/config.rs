//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name used inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

const APP_NAME: &str = "flagrun";

/// Top-level configuration shared by the server and client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Socket and tick settings.
    pub network: NetworkConfig,
    /// Prediction and snapshot playback tuning.
    pub replication: ReplicationConfig,
    /// Dedicated server settings.
    pub server: ServerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the client connects to and the server binds.
    pub server_address: String,
    /// TCP port.
    pub server_port: u16,
    /// Maximum simultaneous connections (server only).
    pub max_connections: usize,
    /// Milliseconds between server ticks.
    pub tick_interval_ms: u64,
    /// Minimum milliseconds between two mouse-position messages (client only).
    pub mouse_send_interval_ms: u64,
    /// Disable Nagle's algorithm on every connection.
    pub tcp_nodelay: bool,
}

/// Tuning for the per-entity motion reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Playback delay for entities the local player does not control.
    pub movement_delay_ms: i64,
    /// Discrepancy at or above which a predicted entity snaps.
    pub prediction_error_threshold: f32,
    /// Queued snapshots tolerated before the queue is flushed.
    pub max_pending_snapshots: usize,
    /// Distance below which a replayed snapshot counts as arrived.
    pub goal_distance_threshold: f32,
    /// Predict the local player's movement before the server confirms it.
    pub prediction_enabled: bool,
}

/// Dedicated server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// RON map description; the built-in arena is used when unset.
    pub map_path: Option<PathBuf>,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".to_string(),
            server_port: 56500,
            max_connections: 32,
            tick_interval_ms: 17,
            mouse_send_interval_ms: 10,
            tcp_nodelay: true,
        }
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            movement_delay_ms: 300,
            prediction_error_threshold: 30.0,
            max_pending_snapshots: 10,
            goal_distance_threshold: 1.0,
            prediction_enabled: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory for flagrun (`$XDG_CONFIG_HOME/flagrun` on Linux).
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|base| base.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::WriteError {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::WriteError {
            path: config_path.clone(),
            source,
        })
    }

    /// Re-read `config.ron`; `Some` only when it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE_NAME))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("server_port: 56500"));
        assert!(ron_str.contains("movement_delay_ms: 300"));
    }

    #[test]
    fn test_replication_defaults() {
        let replication = ReplicationConfig::default();
        assert_eq!(replication.max_pending_snapshots, 10);
        assert_eq!(replication.prediction_error_threshold, 30.0);
        assert_eq!(replication.goal_distance_threshold, 1.0);
        assert!(replication.prediction_enabled);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(network: (server_port: 9000))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.network.server_port, 9000);
        assert_eq!(config.network.tick_interval_ms, 17);
        assert_eq!(config.replication, ReplicationConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(render_distance: 12)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.network.server_address = "10.0.0.1".to_string();
        config.server.map_path = Some(PathBuf::from("maps/canyon.ron"));

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.replication.movement_delay_ms = 150;
        modified.save(dir.path()).unwrap();

        let reloaded = config.reload(dir.path()).unwrap();
        assert_eq!(reloaded.unwrap().replication.movement_delay_ms, 150);
        assert!(modified.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{{not valid}}").unwrap();
        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}
