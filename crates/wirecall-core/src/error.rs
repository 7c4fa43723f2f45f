//! Error types for the registry and protocol core.

use thiserror::Error;

/// Errors from registering or looking up a procedure name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A zero-length name was offered for registration.
    #[error("procedure name is empty")]
    EmptyName,

    /// A name byte fell outside `[0x20, 0x84]`.
    #[error("procedure name byte {0:#04x} is outside the valid range [0x20, 0x84]")]
    InvalidByte(u8),

    /// A name exceeded the 65535-byte length ceiling.
    #[error("procedure name exceeds the maximum length of 65535 bytes")]
    NameTooLong,
}
