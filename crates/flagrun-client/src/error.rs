//! Client error type.

/// Errors that end or prevent a client session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server address did not resolve or the connection failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A send was attempted after the session ended.
    #[error("session is not connected")]
    NotConnected,
}
