//! Fixed-width field I/O over a byte stream, network byte order throughout.
//!
//! `read_exact`/`write_all` loop over short reads/writes until exactly `n`
//! bytes have transferred or the peer closes the connection. A zero-byte
//! read is treated as an orderly close; any other I/O error (including a
//! broken pipe on write, which we never let raise `SIGPIPE`) is treated as a
//! disorderly close. Both collapse to [`ProtocolError::Disconnected`] since
//! the caller's only correct response in either case is to tear the
//! connection down.

use std::io::{self, Read, Write};

use crate::errors::{ProtocolError, Result};

/// Reads exactly `n` bytes from `stream`, looping over short reads.
pub fn read_exact<R: Read>(stream: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => return Err(ProtocolError::Disconnected),
            Ok(read) => filled += read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return Err(ProtocolError::Disconnected),
        }
    }
    Ok(buf)
}

/// Writes all of `bytes` to `stream`, looping over short writes.
pub fn write_all<W: Write>(stream: &mut W, bytes: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < bytes.len() {
        match stream.write(&bytes[written..]) {
            Ok(0) => return Err(ProtocolError::Disconnected),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return Err(ProtocolError::Disconnected),
        }
    }
    Ok(())
}

/// Reads a single tag/flags byte.
pub fn read_u8<R: Read>(stream: &mut R) -> Result<u8> {
    Ok(read_exact(stream, 1)?[0])
}

/// Writes a single tag/flags byte.
pub fn write_u8<W: Write>(stream: &mut W, value: u8) -> Result<()> {
    write_all(stream, &[value])
}

/// Reads a big-endian `u16` (used for name lengths).
pub fn read_u16_be<R: Read>(stream: &mut R) -> Result<u16> {
    let bytes = read_exact(stream, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Writes a big-endian `u16`.
pub fn write_u16_be<W: Write>(stream: &mut W, value: u16) -> Result<()> {
    write_all(stream, &value.to_be_bytes())
}

/// Reads a big-endian `i64` (the payload's signed integer field).
pub fn read_i64_be<R: Read>(stream: &mut R) -> Result<i64> {
    let bytes = read_exact(stream, 8)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes);
    Ok(i64::from_be_bytes(arr))
}

/// Writes a big-endian `i64`.
pub fn write_i64_be<W: Write>(stream: &mut W, value: i64) -> Result<()> {
    write_all(stream, &value.to_be_bytes())
}

/// Reads a big-endian `u64` (digests and buffer lengths).
pub fn read_u64_be<R: Read>(stream: &mut R) -> Result<u64> {
    let bytes = read_exact(stream, 8)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes);
    Ok(u64::from_be_bytes(arr))
}

/// Writes a big-endian `u64`.
pub fn write_u64_be<W: Write>(stream: &mut W, value: u64) -> Result<()> {
    write_all(stream, &value.to_be_bytes())
}
