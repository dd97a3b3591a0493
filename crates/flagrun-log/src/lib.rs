//! Structured logging for the flagrun binaries.
//!
//! Installs a `tracing` subscriber with console output, an optional JSON log
//! file in debug builds, and filtering from `RUST_LOG` or the configured
//! log level.

use std::path::Path;

use flagrun_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names a level.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log written under `log_dir` in debug builds.
pub const LOG_FILE_NAME: &str = "flagrun.log";

/// Initialize the global tracing subscriber.
///
/// Sets up:
/// - console output with uptime, module path, thread name and level
/// - a JSON log file under `log_dir` in debug builds
/// - filtering from `RUST_LOG`, else `debug.log_level`, else [`DEFAULT_FILTER`]
///
/// # Arguments
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - enables the file layer
/// * `config` - supplies `debug.log_level` when `RUST_LOG` is unset
///
/// # Examples
///
/// ```no_run
/// use flagrun_config::Config;
/// use flagrun_log::init_logging;
///
/// // Console only
/// init_logging(None, false, None);
///
/// // Console plus logs/flagrun.log, level from the config
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_from_config(config);

    // RUST_LOG wins over the config
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true) // Show module path
        .with_thread_ids(false)
        .with_thread_names(true) // Show tokio worker names
        .with_level(true)
        .with_timer(fmt::time::uptime()); // Time since process start

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    // Debug builds keep a machine-readable copy for post-mortems
    if debug_build {
        if let Some(log_file) = log_dir.and_then(open_log_file) {
            let file_layer = fmt::layer()
                .with_writer(log_file)
                .with_ansi(false) // No ANSI color codes in file output
                .with_target(true)
                .with_timer(fmt::time::uptime())
                .json();

            subscriber.with(file_layer).init();
            return;
        }
    }

    subscriber.init();
}

/// Create `log_dir` if needed and truncate [`LOG_FILE_NAME`] inside it.
///
/// Returns `None` when either step fails; logging then stays console-only.
pub fn open_log_file(log_dir: &Path) -> Option<std::fs::File> {
    std::fs::create_dir_all(log_dir).ok()?;
    std::fs::File::create(log_dir.join(LOG_FILE_NAME)).ok()
}

/// Filter string derived from the config, falling back to [`DEFAULT_FILTER`].
pub fn filter_from_config(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// An `EnvFilter` built from [`DEFAULT_FILTER`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        let filter = default_env_filter();
        assert!(format!("{filter}").contains("info"));
    }

    #[test]
    fn test_filter_from_config_level() {
        let mut config = Config::default();
        config.debug.log_level = "debug,flagrun_net=trace".to_string();
        assert_eq!(filter_from_config(Some(&config)), "debug,flagrun_net=trace");
    }

    #[test]
    fn test_filter_falls_back_when_empty() {
        let mut config = Config::default();
        config.debug.log_level.clear();
        assert_eq!(filter_from_config(Some(&config)), DEFAULT_FILTER);
        assert_eq!(filter_from_config(None), DEFAULT_FILTER);
    }

    #[test]
    fn test_subsystem_filters_parse() {
        for filter_str in [
            "info",
            "debug,flagrun_server=trace",
            "warn,flagrun_net=debug,flagrun_multiplayer=trace",
        ] {
            assert!(
                EnvFilter::try_from(filter_str).is_ok(),
                "Failed to parse filter: {filter_str}"
            );
        }
    }

    #[test]
    fn test_log_file_created_in_nested_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_dir = temp_dir.path().join("logs").join("server");

        let file = open_log_file(&log_dir);
        assert!(file.is_some());
        assert!(log_dir.join("flagrun.log").is_file());
    }

    #[test]
    fn test_log_file_unavailable_falls_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be
        let blocker = temp_dir.path().join("taken");
        std::fs::write(&blocker, b"").unwrap();

        assert!(open_log_file(&blocker.join("logs")).is_none());
    }
}
