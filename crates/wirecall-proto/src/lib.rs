//! Wire-level primitives shared by the wirecall server and client: fixed-width
//! field I/O, the tagged payload codec, message tags, and the error-mask
//! bitflags carried in an `RTN_ERROR` reply.

mod errors;
mod payload;
mod tags;
pub mod wire;

pub use errors::{ProtocolError, Result};
pub use payload::Payload;
pub use tags::{ErrorMask, MessageTag};

/// The packet-termination byte required at the end of every request and
/// every reply.
pub const END: u8 = 0xED;
