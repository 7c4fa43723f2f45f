//! The tagged two-field payload (spec §3, §4.2).

use std::io::{Read, Write};

use bytes::Bytes;

use crate::{
    errors::{ProtocolError, Result},
    wire::{read_exact, read_i64_be, read_u64_be, read_u8, write_all, write_i64_be, write_u64_be, write_u8},
};

const FLAG_INT: u8 = 0x01;
const FLAG_BUFF: u8 = 0x80;

/// A signed integer paired with an optional opaque byte buffer.
///
/// `buf` is `None` exactly when `n = 0`; a non-empty buffer is always
/// `Some`. [`Payload::new`] enforces this by collapsing an empty buffer to
/// `None`, so the invariant holds for every value constructed through the
/// public API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// The payload's signed 64-bit integer field.
    pub i: i64,
    /// The payload's opaque buffer, absent when empty.
    pub buf: Option<Bytes>,
}

impl Payload {
    /// Builds a payload, collapsing an empty buffer to `None`.
    #[must_use]
    pub fn new(i: i64, buf: Option<Bytes>) -> Self {
        Self { i, buf: buf.filter(|b| !b.is_empty()) }
    }

    /// Builds a payload carrying only the integer field.
    #[must_use]
    pub fn int_only(i: i64) -> Self {
        Self { i, buf: None }
    }

    /// The buffer's length, or 0 if absent.
    #[must_use]
    pub fn buf_len(&self) -> u64 {
        self.buf.as_ref().map_or(0, |b| b.len() as u64)
    }

    /// Encodes this payload: flags byte, then `i` (if INT is set, which it
    /// always is here), then `n` and `n` bytes (if BUFF is set).
    pub fn encode<W: Write>(&self, stream: &mut W) -> Result<()> {
        let mut flags = FLAG_INT;
        if self.buf.is_some() {
            flags |= FLAG_BUFF;
        }
        write_u8(stream, flags)?;
        write_i64_be(stream, self.i)?;
        if let Some(buf) = &self.buf {
            write_u64_be(stream, buf.len() as u64)?;
            write_all(stream, buf)?;
        }
        Ok(())
    }

    /// Decodes a payload. A flags byte with INT clear, or BUFF set with a
    /// zero-length buffer, is [`ProtocolError::MalformedPayload`].
    pub fn decode<R: Read>(stream: &mut R) -> Result<Self> {
        let flags = read_u8(stream)?;
        if flags & FLAG_INT == 0 {
            return Err(ProtocolError::MalformedPayload);
        }
        let i = read_i64_be(stream)?;

        let buf = if flags & FLAG_BUFF != 0 {
            let n = read_u64_be(stream)?;
            if n == 0 {
                return Err(ProtocolError::MalformedPayload);
            }
            let bytes = read_exact(stream, usize::try_from(n).unwrap_or(usize::MAX))?;
            Some(Bytes::from(bytes))
        } else {
            None
        };

        Ok(Self { i, buf })
    }
}
