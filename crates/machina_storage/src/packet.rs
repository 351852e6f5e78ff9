//! Streaming byte buffer for network synchronization.
//!
//! [`PacketBuf`] is the length-implicit encoding used by `write_packet` /
//! `read_packet`: values are written in a fixed field order with no field
//! tags, so the reader must consume them in the same order.
//!
//! # Example
//!
//! ```
//! use machina_storage::packet::PacketBuf;
//!
//! let mut buf = PacketBuf::new();
//! buf.write_bool(true);
//! buf.write_varint(300);
//! buf.write_str("minecraft:water");
//!
//! assert!(buf.read_bool().unwrap());
//! assert_eq!(buf.read_varint().unwrap(), 300);
//! assert_eq!(buf.read_str().unwrap(), "minecraft:water");
//! assert!(buf.is_empty());
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::PacketError;

/// Upper bound on encoded string length.
pub const MAX_STRING_LEN: usize = 32_767 * 4;

/// A growable byte buffer that is written at the back and read at the front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketBuf {
    bytes: BytesMut,
}

impl PacketBuf {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer that reads from `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: BytesMut::from(bytes),
        }
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.remaining()
    }

    /// Returns `true` if every byte has been read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.bytes.has_remaining()
    }

    /// Returns the unread bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Converts the unread bytes into an immutable buffer.
    #[must_use]
    pub fn freeze(self) -> Bytes {
        self.bytes.freeze()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Writing
    // ─────────────────────────────────────────────────────────────────────

    /// Writes a boolean as a single byte.
    pub fn write_bool(&mut self, value: bool) {
        self.bytes.put_u8(u8::from(value));
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.bytes.put_u8(value);
    }

    /// Writes a fixed-width big-endian `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.bytes.put_u64(value);
    }

    /// Writes a LEB128 variable-length integer.
    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.bytes.put_u8(byte);
                return;
            }
            self.bytes.put_u8(byte | 0x80);
        }
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) {
        self.write_varint(value.len() as u64);
        self.bytes.put_slice(value.as_bytes());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reading
    // ─────────────────────────────────────────────────────────────────────

    fn ensure(&self, needed: usize) -> Result<(), PacketError> {
        let remaining = self.bytes.remaining();
        if remaining < needed {
            return Err(PacketError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }

    /// Reads a boolean. Any byte other than 0 or 1 is rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is exhausted or the byte is not a boolean.
    pub fn read_bool(&mut self) -> Result<bool, PacketError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(PacketError::InvalidData(format!(
                "expected boolean, found byte {other}"
            ))),
        }
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is exhausted.
    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        self.ensure(1)?;
        Ok(self.bytes.get_u8())
    }

    /// Reads a fixed-width big-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than eight bytes remain.
    pub fn read_u64(&mut self) -> Result<u64, PacketError> {
        self.ensure(8)?;
        Ok(self.bytes.get_u64())
    }

    /// Reads a LEB128 variable-length integer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is exhausted or the encoding is longer
    /// than a `u64` allows.
    pub fn read_varint(&mut self) -> Result<u64, PacketError> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(PacketError::InvalidData("varint is too long".into()))
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is exhausted, the length exceeds
    /// [`MAX_STRING_LEN`], or the bytes are not valid UTF-8.
    pub fn read_str(&mut self) -> Result<String, PacketError> {
        let len = usize::try_from(self.read_varint()?)
            .ok()
            .filter(|len| *len <= MAX_STRING_LEN)
            .ok_or_else(|| PacketError::InvalidData("string is too long".into()))?;
        self.ensure(len)?;
        let bytes = self.bytes.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec())
            .map_err(|err| PacketError::InvalidData(format!("invalid utf-8: {err}")))
    }
}
