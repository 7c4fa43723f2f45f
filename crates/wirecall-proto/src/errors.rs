//! Error types for the wire and payload codecs.

use thiserror::Error;

/// Errors produced while framing or parsing wirecall messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The peer closed the connection (orderly or disorderly) mid read/write.
    #[error("peer disconnected")]
    Disconnected,

    /// A message was not terminated by the END tag.
    #[error("packet not terminated by END tag")]
    PacketInvalid,

    /// An unrecognised message tag was received.
    #[error("unrecognised message tag {0:#04x}")]
    UnknownTag(u8),

    /// The payload's flags byte is inconsistent with the fields that follow
    /// (BUFF set with a zero length, or INT clear).
    #[error("malformed payload framing")]
    MalformedPayload,

    /// A procedure name failed validation (bad byte range or too long).
    #[error("invalid procedure name")]
    InvalidName,
}

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
