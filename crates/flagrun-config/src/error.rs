//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while locating, loading, or saving `config.ron`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The OS exposes no configuration directory and none was given.
    #[error("no configuration directory available on this platform")]
    NoConfigDir,

    /// Failed to read the config file from disk.
    #[error("failed to read {path}: {source}")]
    ReadError {
        /// File that could not be read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create the config directory or write the file.
    #[error("failed to write {path}: {source}")]
    WriteError {
        /// File or directory that could not be written.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not valid RON for [`Config`](crate::Config).
    #[error("failed to parse {path}: {source}")]
    ParseError {
        /// File that failed to parse.
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    /// Failed to serialize config to RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),
}
