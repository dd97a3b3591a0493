//! Primitive wire encoding.
//!
//! Integers and floats are big-endian, booleans are one byte (non-zero is
//! `true`), strings are an `i32` byte length followed by UTF-8, and a 2D
//! vector is two floats. Decoding works on a `&[u8]` cursor that is advanced
//! past whatever was consumed; running out of bytes yields
//! [`DecodeError::Incomplete`] so a stream reader can wait for more input.

use bytes::{Buf, BufMut, BytesMut};
use glam::Vec2;

/// Longest string accepted on the wire, in bytes.
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// Errors produced while decoding a message body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer ended before the message did.
    #[error("message incomplete")]
    Incomplete,

    /// A message tag outside the known enumeration.
    #[error("unknown message tag {0}")]
    UnknownTag(i32),

    /// A string length that is negative or over [`MAX_STRING_LEN`].
    #[error("invalid string length {0}")]
    InvalidLength(i32),

    /// String bytes that are not UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// A negative element count.
    #[error("invalid element count {0}")]
    InvalidCount(i32),

    /// A creation record naming an entity type nobody registered.
    #[error("unknown entity type {0:?}")]
    UnknownEntityType(String),

    /// A length-delimited value whose body disagrees with its length.
    #[error("value length mismatch: declared {declared}, consumed {consumed}")]
    LengthMismatch {
        /// Length announced on the wire.
        declared: usize,
        /// Bytes the decoder actually consumed.
        consumed: usize,
    },
}

/// A message that can be parsed from the front of a byte cursor.
pub trait WireDecode: Sized {
    /// Parse one value, advancing `buf` past it.
    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError>;
}

/// Reading primitives from a byte cursor.
pub trait WireRead {
    /// Read a big-endian `i32`.
    fn read_int(&mut self) -> Result<i32, DecodeError>;
    /// Read a big-endian `i64`.
    fn read_long(&mut self) -> Result<i64, DecodeError>;
    /// Read a big-endian IEEE-754 `f32`.
    fn read_float(&mut self) -> Result<f32, DecodeError>;
    /// Read a one-byte boolean.
    fn read_bool(&mut self) -> Result<bool, DecodeError>;
    /// Read a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String, DecodeError>;
    /// Read two floats as a vector.
    fn read_vec2(&mut self) -> Result<Vec2, DecodeError>;
    /// Read a non-negative `i32` element count.
    fn read_count(&mut self) -> Result<usize, DecodeError>;
    /// Split off the next `len` bytes.
    fn read_slice(&mut self, len: usize) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

impl<'a> WireRead for &'a [u8] {
    fn read_int(&mut self) -> Result<i32, DecodeError> {
        self.try_get_i32().map_err(|_| DecodeError::Incomplete)
    }

    fn read_long(&mut self) -> Result<i64, DecodeError> {
        self.try_get_i64().map_err(|_| DecodeError::Incomplete)
    }

    fn read_float(&mut self) -> Result<f32, DecodeError> {
        self.try_get_f32().map_err(|_| DecodeError::Incomplete)
    }

    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.try_get_u8()
            .map(|b| b != 0)
            .map_err(|_| DecodeError::Incomplete)
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_int()?;
        let size = usize::try_from(len)
            .ok()
            .filter(|&size| size <= MAX_STRING_LEN)
            .ok_or(DecodeError::InvalidLength(len))?;
        let bytes = self.read_slice(size)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }

    fn read_vec2(&mut self) -> Result<Vec2, DecodeError> {
        let x = self.read_float()?;
        let y = self.read_float()?;
        Ok(Vec2::new(x, y))
    }

    fn read_count(&mut self) -> Result<usize, DecodeError> {
        let count = self.read_int()?;
        usize::try_from(count).map_err(|_| DecodeError::InvalidCount(count))
    }

    fn read_slice(&mut self, len: usize) -> Result<Self, DecodeError> {
        if self.len() < len {
            return Err(DecodeError::Incomplete);
        }
        let slice: &'a [u8] = *self;
        let (head, tail) = slice.split_at(len);
        *self = tail;
        Ok(head)
    }
}

/// Writing the composite primitives `BufMut` lacks.
pub trait WireWrite {
    /// Write a one-byte boolean.
    fn put_bool(&mut self, value: bool);
    /// Write an `i32` byte length followed by UTF-8.
    fn put_string(&mut self, value: &str);
    /// Write two floats.
    fn put_vec2(&mut self, value: Vec2);
    /// Write a collection length as `i32`.
    fn put_count(&mut self, count: usize);
}

impl WireWrite for BytesMut {
    fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    fn put_string(&mut self, value: &str) {
        self.put_count(value.len());
        self.put_slice(value.as_bytes());
    }

    fn put_vec2(&mut self, value: Vec2) {
        self.put_f32(value.x);
        self.put_f32(value.y);
    }

    fn put_count(&mut self, count: usize) {
        self.put_i32(i32::try_from(count).unwrap_or(i32::MAX));
    }
}

/// Bounded pre-allocation for a count read from the wire.
pub fn capacity_hint(count: usize) -> usize {
    count.min(1024)
}
