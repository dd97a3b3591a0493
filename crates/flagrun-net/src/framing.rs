//! Reading tag-prefixed messages from a byte stream.
//!
//! Messages carry no outer length prefix:
//!
//! ```text
//! +-------------------+---------------------------+
//! | tag (4 bytes)     |   body (tag-specific)     |
//! | i32 big-endian    |                           |
//! +-------------------+---------------------------+
//! ```
//!
//! [`MessageReader`] keeps whatever has arrived in a buffer and attempts a
//! parse; a [`DecodeError::Incomplete`] result means "read more and retry".
//! Bytes are consumed only after a full message parses, so a message split
//! across reads is never half-applied.
//!
//! A parse restarts from the first byte of the pending message, so a message
//! that trickles in costs one parse per read. Reads grow with the pending
//! message to keep that count logarithmic when the peer is sending fast, and a
//! buffer that has not grown since the last `Incomplete` is not parsed again.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{DecodeError, WireDecode};

/// Bytes requested from the socket per read.
const READ_CHUNK: usize = 8 * 1024;

/// Configuration for [`MessageReader`].
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest message the reader will buffer while waiting for its end.
    /// Default: 4 MB.
    pub max_buffered: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_buffered: 4 * 1024 * 1024,
        }
    }
}

/// Errors that end a read loop. All of them are fatal for the connection.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The peer closed the stream between messages.
    #[error("connection closed")]
    Closed,

    /// The peer closed the stream part way through a message.
    #[error("connection closed with {0} bytes of an unfinished message")]
    Truncated(usize),

    /// An incomplete message grew past [`FrameConfig::max_buffered`].
    #[error("message exceeds {max} buffered bytes")]
    MessageTooLarge {
        /// The configured maximum.
        max: usize,
    },

    /// The buffered bytes are not a valid message.
    #[error("malformed message: {0}")]
    Decode(#[from] DecodeError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Buffered reader that yields whole messages.
pub struct MessageReader<R> {
    reader: R,
    buffer: BytesMut,
    config: FrameConfig,
    /// Buffer length at the last `Incomplete`; 0 when none is pending.
    stalled_at: usize,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    /// Wrap `reader` with the default [`FrameConfig`].
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, FrameConfig::default())
    }

    /// Wrap `reader` with an explicit configuration.
    pub fn with_config(reader: R, config: FrameConfig) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            config,
            stalled_at: 0,
        }
    }

    /// Read the next message, waiting for more bytes as needed.
    ///
    /// Cancel-safe: a partially received message stays buffered.
    pub async fn read<T: WireDecode>(&mut self) -> Result<T, ReadError> {
        loop {
            if let Some(message) = self.try_parse()? {
                return Ok(message);
            }

            if self.buffer.len() >= self.config.max_buffered {
                return Err(ReadError::MessageTooLarge {
                    max: self.config.max_buffered,
                });
            }

            let room = self.config.max_buffered - self.buffer.len();
            self.buffer.reserve(READ_CHUNK.max(self.buffer.len()).min(room));
            let n = self.reader.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(if self.buffer.is_empty() {
                    ReadError::Closed
                } else {
                    ReadError::Truncated(self.buffer.len())
                });
            }
        }
    }

    /// Number of bytes received but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn try_parse<T: WireDecode>(&mut self) -> Result<Option<T>, ReadError> {
        if self.buffer.is_empty() || self.buffer.len() == self.stalled_at {
            return Ok(None);
        }

        let mut cursor: &[u8] = &self.buffer;
        match T::decode(&mut cursor) {
            Ok(message) => {
                let consumed = self.buffer.len() - cursor.len();
                self.buffer.advance(consumed);
                self.stalled_at = 0;
                Ok(Some(message))
            }
            Err(DecodeError::Incomplete) => {
                self.stalled_at = self.buffer.len();
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Write one encoded message and flush.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &[u8],
) -> std::io::Result<()> {
    writer.write_all(message).await?;
    writer.flush().await
}
