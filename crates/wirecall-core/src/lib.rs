//! Sans-IO procedure registry, hardware-profile negotiation, and protocol
//! state machine shared by the wirecall server and client. This crate
//! performs no I/O: every function here takes already-decoded values in and
//! returns a plain value or action out, so the state machine is testable
//! without a socket.

pub mod error;
pub mod profile;
pub mod protocol;
pub mod registry;

pub use error::RegistryError;
pub use profile::HardwareProfile;
pub use protocol::{
    ClientConnectionState, ServerAction, ServerConnectionState, ServerReply, ServerState,
};
pub use registry::{Handler, Registry, DIGEST_NOT_FOUND};
